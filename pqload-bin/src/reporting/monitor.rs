use super::csv;
use crate::sampler::ResourceSample;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const MONITOR_HEADER: &[&str] = &[
    "Timestamp",
    "CPU_Usage(%)",
    "Memory_Usage(%)",
    "Active_Connections",
    "Bytes_Sent",
    "Bytes_Received",
];

/// Append-only resource sample log. Every row is flushed as soon as it is
/// written so an aborted run still leaves a readable file.
pub struct MonitorSink<W: Write> {
    out: W,
}

impl MonitorSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<MonitorSink<BufWriter<File>>> {
        MonitorSink::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> MonitorSink<W> {
    pub fn new(mut out: W) -> io::Result<MonitorSink<W>> {
        csv::write_row(&mut out, MONITOR_HEADER)?;
        out.flush()?;
        Ok(MonitorSink { out })
    }

    pub fn append(&mut self, sample: &ResourceSample) -> io::Result<()> {
        csv::write_row(
            &mut self.out,
            &[
                sample
                    .timestamp
                    .format("%Y-%m-%d %H:%M:%S%.6f")
                    .to_string(),
                format!("{:.1}", sample.cpu_percent),
                format!("{:.1}", sample.memory_percent),
                sample.active_requests.to_string(),
                sample.bytes_sent.to_string(),
                sample.bytes_received.to_string(),
            ],
        )?;
        self.out.flush()
    }
}
