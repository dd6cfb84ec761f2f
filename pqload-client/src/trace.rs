use regex::{Captures, Regex};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

pub const UNKNOWN: &str = "Unknown";

const CERTIFICATE_MESSAGE: &str = "TLS handshake, Certificate (11):";

/// Protocol facts recovered from one request's trace log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSummary {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub kem: String,
    pub signature_algorithm: String,
    pub certificate_size: u64,
}

impl Default for TraceSummary {
    fn default() -> TraceSummary {
        TraceSummary {
            bytes_sent: 0,
            bytes_received: 0,
            kem: UNKNOWN.into(),
            signature_algorithm: UNKNOWN.into(),
            certificate_size: 0,
        }
    }
}

#[derive(Debug, Error)]
#[error("could not read trace '{path}': {source}")]
pub struct TraceError {
    path: String,
    source: io::Error,
}

/// Pattern matcher for the line-oriented `--trace` output of the client tool.
///
/// Byte counts add up every matching line, so a line logged twice is counted
/// twice. The negotiation line is last-wins, the certificate size is taken
/// from the first `Certificate` message followed directly by a receive line.
#[derive(Debug, Clone)]
pub struct TraceParser {
    sent: Regex,
    received: Regex,
    negotiated: Regex,
    signed_using: Regex,
    certificate_received: Regex,
}

impl Default for TraceParser {
    fn default() -> TraceParser {
        TraceParser::new()
    }
}

fn compile(pattern: &str) -> Regex {
    // Patterns are fixed at compile time; failure here is a programming error.
    Regex::new(pattern).expect("trace pattern must be valid")
}

/// Value of the first participating numeric group in `caps`.
fn first_count(caps: &Captures) -> Option<u64> {
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .and_then(|m| m.as_str().parse().ok())
}

impl TraceParser {
    pub fn new() -> TraceParser {
        TraceParser {
            sent: compile(r"=> Send SSL data, (\d+)|Send header, (\d+)"),
            received: compile(r"<= Recv SSL data, (\d+)|Recv header, (\d+)|Recv data, (\d+)"),
            negotiated: compile(r"SSL connection using TLSv[\d.]+ / .* / (\S+) / (\S+)"),
            signed_using: compile(r"Certificate level 1: .* signed using ([^,]+)"),
            certificate_received: compile(r"<= Recv SSL data, (\d+)"),
        }
    }

    pub fn parse_str(&self, trace: &str) -> TraceSummary {
        let mut summary = TraceSummary::default();
        let mut negotiated_signature = None;
        let mut certificate_signature = None;
        let mut certificate_size = None;
        let mut after_certificate = false;

        for line in trace.lines() {
            if let Some(n) = self.sent.captures(line).as_ref().and_then(first_count) {
                summary.bytes_sent = summary.bytes_sent.saturating_add(n);
            }
            if let Some(n) = self.received.captures(line).as_ref().and_then(first_count) {
                summary.bytes_received = summary.bytes_received.saturating_add(n);
            }
            if let Some(caps) = self.negotiated.captures(line) {
                summary.kem = caps[1].to_string();
                negotiated_signature = Some(caps[2].to_string());
            }
            if let Some(caps) = self.signed_using.captures(line) {
                certificate_signature = Some(caps[1].trim().to_string());
            }
            if after_certificate && certificate_size.is_none() {
                certificate_size = self
                    .certificate_received
                    .captures(line)
                    .as_ref()
                    .and_then(first_count);
            }
            after_certificate = line.contains(CERTIFICATE_MESSAGE);
        }

        if let Some(sig) = negotiated_signature.or(certificate_signature) {
            summary.signature_algorithm = sig;
        }
        summary.certificate_size = certificate_size.unwrap_or(0);
        summary
    }

    pub fn parse_path<P: AsRef<Path>>(&self, path: P) -> Result<TraceSummary, TraceError> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|source| TraceError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(self.parse_str(&String::from_utf8_lossy(&raw)))
    }

    /// Like [`TraceParser::parse_path`], but a missing or unreadable trace
    /// yields the default summary.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> TraceSummary {
        self.parse_path(path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TRACE: &str = "\
== Info:   Trying 172.18.0.2:4433...
== Info: Connected to nginx_pq (172.18.0.2) port 4433
== Info: TLSv1.3 (OUT), TLS handshake, Client hello (1):
=> Send SSL data, 1593 bytes (0x639)
0000: 16 03 01 06 34 01 00 06 30 03 03 1a 2b 3c 4d 5e ....4...0...+<M^
== Info: TLSv1.3 (IN), TLS handshake, Server hello (2):
<= Recv SSL data, 1610 bytes (0x64a)
== Info: TLSv1.3 (IN), TLS handshake, Encrypted Extensions (8):
<= Recv SSL data, 21 bytes (0x15)
== Info: TLSv1.3 (IN), TLS handshake, Certificate (11):
<= Recv SSL data, 5324 bytes (0x14cc)
== Info: TLSv1.3 (IN), TLS handshake, CERT verify (15):
<= Recv SSL data, 2424 bytes (0x978)
== Info: TLSv1.3 (IN), TLS handshake, Finished (20):
<= Recv SSL data, 52 bytes (0x34)
== Info: TLSv1.3 (OUT), TLS handshake, Finished (20):
=> Send SSL data, 52 bytes (0x34)
== Info: SSL connection using TLSv1.3 / TLS_AES_256_GCM_SHA384 / x25519_mlkem512 / mldsa44
=> Send header, 78 bytes (0x4e)
<= Recv header, 17 bytes (0x11)
<= Recv data, 615 bytes (0x267)
";

    #[test]
    fn sums_send_and_receive_records() {
        let s = TraceParser::new().parse_str(TRACE);
        assert_eq!(s.bytes_sent, 1593 + 52 + 78);
        assert_eq!(s.bytes_received, 1610 + 21 + 5324 + 2424 + 52 + 17 + 615);
        assert_eq!(s.kem, "x25519_mlkem512");
        assert_eq!(s.signature_algorithm, "mldsa44");
        assert_eq!(s.certificate_size, 5324);
    }

    #[test]
    fn parsing_twice_gives_the_same_result() {
        let p = TraceParser::new();
        assert_eq!(p.parse_str(TRACE), p.parse_str(TRACE));
    }

    #[test]
    fn duplicate_lines_are_counted_twice() {
        let trace = "=> Send SSL data, 10 bytes\n=> Send SSL data, 10 bytes\n";
        assert_eq!(TraceParser::new().parse_str(trace).bytes_sent, 20);
    }

    #[test]
    fn last_negotiation_line_wins() {
        let trace = "\
== Info: SSL connection using TLSv1.3 / TLS_AES_128_GCM_SHA256 / secp256r1 / ecdsa_secp256r1_sha256
== Info: SSL connection using TLSv1.3 / TLS_AES_256_GCM_SHA384 / mlkem768 / mldsa65
";
        let s = TraceParser::new().parse_str(trace);
        assert_eq!(s.kem, "mlkem768");
        assert_eq!(s.signature_algorithm, "mldsa65");
    }

    #[test]
    fn certificate_level_signature_is_a_fallback() {
        let trace = "== Info:  Certificate level 1: Public key type ML-DSA-87 (20736/256 Bits/secBits), signed using mldsa87, issuer CA\n";
        let s = TraceParser::new().parse_str(trace);
        assert_eq!(s.kem, UNKNOWN);
        assert_eq!(s.signature_algorithm, "mldsa87");
    }

    #[test]
    fn certificate_needs_adjacent_receive_line() {
        let p = TraceParser::new();
        let separated = "\
== Info: TLSv1.3 (IN), TLS handshake, Certificate (11):
== Info: something else
<= Recv SSL data, 4000 bytes
";
        assert_eq!(p.parse_str(separated).certificate_size, 0);

        let twice = "\
== Info: TLSv1.3 (IN), TLS handshake, Certificate (11):
<= Recv SSL data, 4000 bytes
== Info: TLSv1.3 (IN), TLS handshake, Certificate (11):
<= Recv SSL data, 9000 bytes
";
        assert_eq!(p.parse_str(twice).certificate_size, 4000);
        assert_eq!(p.parse_str("").certificate_size, 0);
    }

    #[test]
    fn missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = TraceParser::new();
        let missing = dir.path().join("trace_1.log");
        assert!(p.parse_path(&missing).is_err());
        assert_eq!(p.parse_file(&missing), TraceSummary::default());

        let present = dir.path().join("trace_2.log");
        let mut f = fs::File::create(&present).unwrap();
        f.write_all(TRACE.as_bytes()).unwrap();
        assert_eq!(p.parse_file(&present).certificate_size, 5324);
    }
}
