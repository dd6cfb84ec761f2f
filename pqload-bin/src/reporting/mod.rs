mod averages;
mod csv;
mod format;
mod monitor;
mod results;
mod statistics;

pub use self::averages::append_average;
pub use self::monitor::MonitorSink;
pub use self::results::ResultSink;
pub use self::statistics::RunSummary;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not create result directory '{path}': {source}")]
    Setup { path: PathBuf, source: io::Error },
    #[error("could not write results to '{path}': {source}")]
    Results { path: PathBuf, source: io::Error },
}
