use crate::util;
use hdrhistogram::Histogram;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Percentile {
    label: String,
    percentile: f64,
}

impl Percentile {
    pub fn new<S: Into<String>>(label: S, percentile: f64) -> Percentile {
        Percentile {
            label: label.into(),
            percentile,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Summary of a latency histogram at the time it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoSnapshot {
    len: u64,
    min: Duration,
    max: Duration,
    mean: Duration,
    stdev: Duration,
    percentiles: Vec<(Percentile, Duration)>,
}

impl HistoSnapshot {
    pub fn from_histo(histo: &Histogram<u64>, percentiles: &[Percentile]) -> HistoSnapshot {
        let values = percentiles
            .iter()
            .map(|p| {
                (
                    p.clone(),
                    util::micros_to_duration(histo.value_at_percentile(p.percentile)),
                )
            })
            .collect();
        HistoSnapshot {
            len: histo.len(),
            min: util::micros_to_duration(histo.min()),
            max: util::micros_to_duration(histo.max()),
            mean: util::micros_to_duration(histo.mean().trunc() as u64),
            stdev: util::micros_to_duration(histo.stdev().trunc() as u64),
            percentiles: values,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn mean(&self) -> Duration {
        self.mean
    }

    pub fn stdev(&self) -> Duration {
        self.stdev
    }

    /// Look up a configured percentile by its label, e.g. `"p99"`.
    pub fn percentile(&self, label: &str) -> Option<Duration> {
        self.percentiles
            .iter()
            .find(|(p, _)| p.label() == label)
            .map(|(_, d)| *d)
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    key: T,
    count: Option<u64>,
    gauge: Option<u64>,
    peak: Option<u64>,
    latency_snapshot: Option<HistoSnapshot>,
}

impl<T: Clone> Snapshot<T> {
    pub fn new(
        key: T,
        count: Option<u64>,
        gauge: Option<u64>,
        peak: Option<u64>,
        latency_histogram: Option<&Histogram<u64>>,
        percentiles: &[Percentile],
    ) -> Snapshot<T> {
        Snapshot {
            key,
            count,
            gauge,
            peak,
            latency_snapshot: latency_histogram.map(|h| HistoSnapshot::from_histo(h, percentiles)),
        }
    }

    pub fn key(&self) -> T {
        self.key.clone()
    }

    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn gauge(&self) -> Option<u64> {
        self.gauge
    }

    pub fn peak(&self) -> Option<u64> {
        self.peak
    }

    pub fn latency_histogram(&self) -> Option<&HistoSnapshot> {
        self.latency_snapshot.as_ref()
    }
}
