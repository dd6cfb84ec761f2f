use super::csv;
use super::format::fmt_millis;
use super::statistics::RunSummary;
use crate::executor::RequestResult;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

pub const RESULT_HEADER: &[&str] = &[
    "Request_Number",
    "Connect_Time",
    "TLS_Handshake",
    "Total_Time",
    "Elapsed_Time",
    "Status",
    "Success_Count",
    "Bytes_Sent",
    "Bytes_Received",
    "KEM",
    "Signature",
    "Cert_Size",
];

/// Running tally of successes at one point of the emitted row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessCount {
    pub seen: u64,
    pub total: u64,
}

impl fmt::Display for SuccessCount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.seen, self.total)
    }
}

/// Tally successes over `results` in the given order. Failed rows carry the
/// tally unchanged.
pub fn assign_success_counts(results: &[RequestResult], total: u64) -> Vec<SuccessCount> {
    let mut seen = 0;
    results
        .iter()
        .map(|r| {
            if r.is_success() {
                seen += 1;
            }
            SuccessCount { seen, total }
        })
        .collect()
}

fn millis(d: Option<Duration>) -> String {
    d.map(fmt_millis).unwrap_or_default()
}

/// Per-request result file followed by the aggregate block.
pub struct ResultSink<W: Write> {
    out: W,
}

impl ResultSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<ResultSink<BufWriter<File>>> {
        ResultSink::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> ResultSink<W> {
    pub fn new(mut out: W) -> io::Result<ResultSink<W>> {
        csv::write_row(&mut out, RESULT_HEADER)?;
        Ok(ResultSink { out })
    }

    pub fn write_result(&mut self, r: &RequestResult, count: SuccessCount) -> io::Result<()> {
        let t = &r.trace;
        csv::write_row(
            &mut self.out,
            &[
                r.request_number.to_string(),
                millis(r.connect_time),
                millis(r.handshake_time),
                millis(r.total_time),
                millis(r.elapsed_time),
                r.status.to_string(),
                count.to_string(),
                t.bytes_sent.to_string(),
                t.bytes_received.to_string(),
                t.kem.clone(),
                t.signature_algorithm.clone(),
                t.certificate_size.to_string(),
            ],
        )
    }

    /// Write every result in order with its running success count.
    pub fn write_results(&mut self, results: &[RequestResult], total: u64) -> io::Result<()> {
        let counts = assign_success_counts(results, total);
        for (r, c) in results.iter().zip(counts) {
            self.write_result(r, c)?;
        }
        Ok(())
    }

    pub fn write_summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        self.out.write_all(b"\n")?;
        csv::write_row(&mut self.out, &["Metric", "Value"])?;
        for (metric, value) in summary.rows() {
            csv::write_row(&mut self.out, &[metric, value.as_str()])?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
