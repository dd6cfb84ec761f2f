use super::format::{fmt_duration, fmt_millis, fmt_size};
use crate::executor::RequestResult;
use crate::sampler::ResourceSample;
use pqload_client::Metric;
use pqload_metrics::data::HistoSnapshot;
use pqload_metrics::Collector;
use std::fmt;
use std::time::Duration;

/// Host usage over the samples of one run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResourceStats {
    pub avg_cpu_percent: f64,
    pub avg_memory_percent: f64,
    pub peak_memory_percent: f64,
    pub samples: usize,
}

impl ResourceStats {
    /// Averages only count samples with non-zero CPU; the first readings
    /// of a fresh probe report zero.
    pub fn from_samples(samples: &[ResourceSample]) -> ResourceStats {
        let (mut cpu, mut mem, mut counted) = (0.0, 0.0, 0usize);
        let mut peak = 0.0f64;
        for s in samples {
            peak = peak.max(f64::from(s.memory_percent));
            if s.cpu_percent > 0.0 {
                cpu += f64::from(s.cpu_percent);
                mem += f64::from(s.memory_percent);
                counted += 1;
            }
        }
        let avg = |total: f64| {
            if counted == 0 {
                0.0
            } else {
                total / counted as f64
            }
        };
        ResourceStats {
            avg_cpu_percent: avg(cpu),
            avg_memory_percent: avg(mem),
            peak_memory_percent: peak,
            samples: samples.len(),
        }
    }
}

fn mean(values: impl Iterator<Item = Duration>) -> Option<Duration> {
    let (total, n) = values.fold((Duration::default(), 0u32), |(t, n), d| (t + d, n + 1));
    if n == 0 {
        None
    } else {
        Some(total / n)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub requests: usize,
    pub successes: usize,
    pub avg_connect: Option<Duration>,
    pub avg_handshake: Option<Duration>,
    pub avg_total: Option<Duration>,
    pub avg_elapsed: Option<Duration>,
    pub elapsed: Option<HistoSnapshot>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub avg_cert_size: Option<u64>,
    pub resources: ResourceStats,
    pub wall_time: Duration,
}

impl RunSummary {
    /// Timing averages come from the successful results. Byte totals and
    /// elapsed percentiles come from the collector, which must have been
    /// drained first. Requests without a detected certificate do not count
    /// toward the average certificate size.
    pub fn compute(
        results: &[RequestResult],
        samples: &[ResourceSample],
        collector: &Collector<Metric>,
        wall_time: Duration,
    ) -> RunSummary {
        let ok: Vec<&RequestResult> = results.iter().filter(|r| r.is_success()).collect();
        let certs: Vec<u64> = results
            .iter()
            .map(|r| r.trace.certificate_size)
            .filter(|s| *s > 0)
            .collect();
        RunSummary {
            requests: results.len(),
            successes: ok.len(),
            avg_connect: mean(ok.iter().filter_map(|r| r.connect_time)),
            avg_handshake: mean(ok.iter().filter_map(|r| r.handshake_time)),
            avg_total: mean(ok.iter().filter_map(|r| r.total_time)),
            avg_elapsed: mean(ok.iter().filter_map(|r| r.elapsed_time)),
            elapsed: collector
                .snapshot(&Metric::Elapsed)
                .latency_histogram()
                .cloned(),
            bytes_sent: collector
                .snapshot(&Metric::BytesSent)
                .count()
                .unwrap_or(0),
            bytes_received: collector
                .snapshot(&Metric::BytesReceived)
                .count()
                .unwrap_or(0),
            avg_cert_size: if certs.is_empty() {
                None
            } else {
                Some(certs.iter().sum::<u64>() / certs.len() as u64)
            },
            resources: ResourceStats::from_samples(samples),
            wall_time,
        }
    }

    pub fn failures(&self) -> usize {
        self.requests - self.successes
    }

    fn elapsed_percentile(&self, label: &str) -> Option<Duration> {
        self.elapsed.as_ref().and_then(|h| h.percentile(label))
    }

    /// The aggregate block written after the per-request rows.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let ms = |d: Option<Duration>| d.map(fmt_millis).unwrap_or_default();
        let pct = |v: f64| format!("{:.2}", v);
        let r = &self.resources;
        vec![
            ("Requests", self.requests.to_string()),
            ("Successes", self.successes.to_string()),
            ("Failures", self.failures().to_string()),
            ("Avg_Connect_Time(ms)", ms(self.avg_connect)),
            ("Avg_TLS_Handshake(ms)", ms(self.avg_handshake)),
            ("Avg_Total_Time(ms)", ms(self.avg_total)),
            ("Avg_Elapsed_Time(ms)", ms(self.avg_elapsed)),
            ("P50_Elapsed_Time(ms)", ms(self.elapsed_percentile("p50"))),
            ("P90_Elapsed_Time(ms)", ms(self.elapsed_percentile("p90"))),
            ("P99_Elapsed_Time(ms)", ms(self.elapsed_percentile("p99"))),
            ("Total_Bytes_Sent", self.bytes_sent.to_string()),
            ("Total_Bytes_Received", self.bytes_received.to_string()),
            (
                "Avg_Cert_Size(B)",
                self.avg_cert_size.map(|s| s.to_string()).unwrap_or_default(),
            ),
            ("Avg_CPU_Usage(%)", pct(r.avg_cpu_percent)),
            ("Avg_Memory_Usage(%)", pct(r.avg_memory_percent)),
            ("Peak_Memory_Usage(%)", pct(r.peak_memory_percent)),
            ("Samples", r.samples.to_string()),
            ("Wall_Time(ms)", fmt_millis(self.wall_time)),
        ]
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{} succeeded", self.successes, self.requests)?;
        if let Some(h) = self.elapsed.as_ref().filter(|h| !h.is_empty()) {
            write!(
                f,
                " | elapsed count {}/min {}/avg {}/max {}/stdev {}",
                h.len(),
                fmt_duration(&h.min()),
                fmt_duration(&h.mean()),
                fmt_duration(&h.max()),
                fmt_duration(&h.stdev())
            )?;
        }
        write!(
            f,
            " | sent {} received {} | cpu {:.1}% mem {:.1}% (peak {:.1}%) | wall {}",
            fmt_size(self.bytes_sent),
            fmt_size(self.bytes_received),
            self.resources.avg_cpu_percent,
            self.resources.avg_memory_percent,
            self.resources.peak_memory_percent,
            fmt_duration(&self.wall_time)
        )
    }
}
