use super::csv;
use super::format::fmt_millis;
use super::statistics::RunSummary;
use crate::session::RunId;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

const AVERAGES_HEADER: &[&str] = &[
    "Run_Id",
    "Avg_Connect_Time(ms)",
    "Avg_Handshake_Time(ms)",
    "Avg_Total_Time(ms)",
    "Avg_Elapsed_Time(ms)",
    "Avg_CPU_Usage(%)",
    "Avg_RAM_Usage(%)",
];

/// Append one row per run to the cross-run averages file, writing the
/// header first if the file is new or empty. Returns `false` without
/// touching the file when no request succeeded.
pub fn append_average<P: AsRef<Path>>(
    path: P,
    run_id: &RunId,
    summary: &RunSummary,
) -> io::Result<bool> {
    if summary.successes == 0 {
        return Ok(false);
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    if f.metadata()?.len() == 0 {
        csv::write_row(&mut f, AVERAGES_HEADER)?;
    }
    let ms = |d: Option<Duration>| d.map(fmt_millis).unwrap_or_default();
    csv::write_row(
        &mut f,
        &[
            run_id.to_string(),
            ms(summary.avg_connect),
            ms(summary.avg_handshake),
            ms(summary.avg_total),
            ms(summary.avg_elapsed),
            format!("{:.2}", summary.resources.avg_cpu_percent),
            format!("{:.2}", summary.resources.avg_memory_percent),
        ],
    )?;
    f.flush()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::statistics::ResourceStats;
    use std::fs;

    fn summary(successes: usize) -> RunSummary {
        RunSummary {
            requests: 4,
            successes,
            avg_connect: Some(Duration::from_millis(10)),
            avg_handshake: Some(Duration::from_millis(30)),
            avg_total: Some(Duration::from_millis(50)),
            avg_elapsed: Some(Duration::from_millis(55)),
            elapsed: None,
            bytes_sent: 0,
            bytes_received: 0,
            avg_cert_size: None,
            resources: ResourceStats {
                avg_cpu_percent: 12.5,
                avg_memory_percent: 40.0,
                peak_memory_percent: 41.0,
                samples: 3,
            },
            wall_time: Duration::from_secs(1),
        }
    }

    #[test]
    fn header_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("average_metrics.csv");
        assert!(append_average(&path, &RunId::new("a"), &summary(4)).unwrap());
        assert!(append_average(&path, &RunId::new("b"), &summary(2)).unwrap());

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], AVERAGES_HEADER.join(","));
        assert_eq!(lines[1], "a,10.000,30.000,50.000,55.000,12.50,40.00");
        assert!(lines[2].starts_with("b,"));
    }

    #[test]
    fn runs_without_successes_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("average_metrics.csv");
        assert!(!append_average(&path, &RunId::new("a"), &summary(0)).unwrap());
        assert!(!path.exists());
    }
}
