use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const CONNECT: &str = "Connect Time";
const HANDSHAKE: &str = "TLS Handshake";
const TOTAL: &str = "Total Time";

/// Timings the client tool prints through its `-w` format:
///
/// `Connect Time: <s>, TLS Handshake: <s>, Total Time: <s>[, <http_status>]`
///
/// Values are seconds with an optional `s` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOut {
    pub connect: Duration,
    pub handshake: Duration,
    pub total: Duration,
    pub http_status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteOutError {
    #[error("client printed no timing line")]
    Empty,
    #[error("timing line is missing '{0}'")]
    MissingField(&'static str),
    #[error("invalid value for '{field}': '{value}'")]
    InvalidValue { field: String, value: String },
    #[error("unexpected segment '{0}' in timing line")]
    Malformed(String),
}

fn parse_seconds(field: &str, raw: &str) -> Result<Duration, WriteOutError> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('s').unwrap_or(trimmed);
    number
        .parse::<f64>()
        .ok()
        .and_then(|v| Duration::try_from_secs_f64(v).ok())
        .ok_or_else(|| WriteOutError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

fn is_status(segment: &str) -> bool {
    segment.len() == 3 && segment.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for WriteOut {
    type Err = WriteOutError;

    /// Only the last non-empty line is considered, anything the tool wrote
    /// before it is ignored. Unknown `key: value` segments are skipped.
    fn from_str(s: &str) -> Result<WriteOut, WriteOutError> {
        let line = s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .ok_or(WriteOutError::Empty)?;

        let mut connect = None;
        let mut handshake = None;
        let mut total = None;
        let mut http_status = None;

        let segments: Vec<&str> = line.split(", ").map(str::trim).collect();
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            match segment.split_once(": ") {
                Some((CONNECT, v)) => connect = Some(parse_seconds(CONNECT, v)?),
                Some((HANDSHAKE, v)) => handshake = Some(parse_seconds(HANDSHAKE, v)?),
                Some((TOTAL, v)) => total = Some(parse_seconds(TOTAL, v)?),
                Some(_) => {}
                None if i == last && is_status(segment) => {
                    http_status = segment.parse::<u16>().ok();
                }
                None => return Err(WriteOutError::Malformed(segment.to_string())),
            }
        }

        Ok(WriteOut {
            connect: connect.ok_or(WriteOutError::MissingField(CONNECT))?,
            handshake: handshake.ok_or(WriteOutError::MissingField(HANDSHAKE))?,
            total: total.ok_or(WriteOutError::MissingField(TOTAL))?,
            http_status,
        })
    }
}
