use crate::config::OutputConfig;
use chrono::Local;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Identifies one invocation; every file the run writes carries it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> RunId {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let id = Uuid::new_v4().simple().to_string();
        RunId(format!("{}-{}", stamp, &id[..8]))
    }

    pub fn new<S: Into<String>>(id: S) -> RunId {
        RunId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFiles {
    pub run_id: RunId,
    pub results: PathBuf,
    pub monitor: PathBuf,
    pub averages: PathBuf,
    pub trace_dir: PathBuf,
}

impl RunFiles {
    pub fn new(output: &OutputConfig, run_id: &RunId) -> RunFiles {
        RunFiles {
            run_id: run_id.clone(),
            results: output
                .results_dir
                .join(format!("request_client_{}.csv", run_id)),
            monitor: output
                .monitor_dir
                .join(format!("system_client_{}.csv", run_id)),
            averages: output.results_dir.join("average_metrics.csv"),
            trace_dir: output.trace_dir.clone(),
        }
    }

    /// Trace log path for one request, unique across runs and requests.
    pub fn trace(&self, request_number: u64) -> PathBuf {
        self.trace_dir
            .join(format!("trace_{}_{}.log", self.run_id, request_number))
    }

    pub fn results_dir(&self) -> &Path {
        self.results.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn monitor_dir(&self) -> &Path {
        self.monitor.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn create_results_dir(&self) -> io::Result<()> {
        fs::create_dir_all(self.results_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_differ() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), "20261014-135600-".len() + 8);
    }

    #[test]
    fn paths_carry_the_run_id() {
        let output = OutputConfig {
            results_dir: "/out/request_logs".into(),
            monitor_dir: "/out/system_logs".into(),
            trace_dir: "/logs".into(),
        };
        let files = RunFiles::new(&output, &RunId::new("r1"));
        assert_eq!(
            files.results,
            PathBuf::from("/out/request_logs/request_client_r1.csv")
        );
        assert_eq!(
            files.monitor,
            PathBuf::from("/out/system_logs/system_client_r1.csv")
        );
        assert_eq!(files.trace(12), PathBuf::from("/logs/trace_r1_12.log"));
        assert_eq!(files.results_dir(), Path::new("/out/request_logs"));
    }
}
