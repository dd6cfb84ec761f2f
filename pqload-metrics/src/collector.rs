use crate::counter::Counters;
use crate::gauge::Gauges;
use crate::histogram::Histograms;
use crate::sample::{Sample, SampleValue};
use crate::snapshots::{Percentile, Snapshot};
use crate::util;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::hash::Hash;
use std::time::Duration;

#[derive(Debug)]
pub enum Interest<T> {
    Count(T),
    Gauge(T),
    LatencyPercentile(T),
}

/// Owner of all aggregated metrics.
///
/// Producers never touch the aggregates directly: they send samples through
/// a [`CollectorHandle`], and the owner folds them in with
/// [`Collector::process_outstanding`]. Samples for keys nobody registered
/// interest in are dropped.
pub struct Collector<T> {
    counters: Counters<T>,
    gauges: Gauges<T>,
    latency_histograms: Histograms<T>,
    tx: Sender<Sample<T>>,
    rx: Receiver<Sample<T>>,
    percentiles: Vec<Percentile>,
}

pub fn default_percentiles() -> Vec<Percentile> {
    vec![
        Percentile::new("p50", 50.0),
        Percentile::new("p90", 90.0),
        Percentile::new("p99", 99.0),
    ]
}

impl<T> Default for Collector<T>
where
    T: Hash + Eq + Clone + Send,
{
    fn default() -> Self {
        Collector::new()
    }
}

impl<T> Collector<T>
where
    T: Hash + Eq + Clone + Send,
{
    pub fn new() -> Collector<T> {
        let (tx, rx) = unbounded();
        Collector {
            counters: Counters::new(),
            gauges: Gauges::new(),
            latency_histograms: Histograms::new(),
            tx,
            rx,
            percentiles: default_percentiles(),
        }
    }

    pub fn register(&mut self, ty: Interest<T>) {
        use self::Interest::*;
        match ty {
            Count(key) => self.counters.init(key),
            LatencyPercentile(key) => self.latency_histograms.init(key),
            Gauge(key) => self.gauges.init(key),
        }
    }

    pub fn handle(&self) -> CollectorHandle<T> {
        CollectorHandle {
            sender: self.tx.clone(),
        }
    }

    /// Drain every queued sample into the aggregates. Returns how many
    /// samples were processed.
    pub fn process_outstanding(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(sample) = self.rx.try_recv() {
            let key = sample.key();
            match sample.value {
                SampleValue::Elapsed(d) => {
                    let micros = util::duration_to_micros(d);
                    self.counters.increment(&key);
                    self.gauges.set(&key, micros);
                    self.latency_histograms.record(&key, micros);
                }
                SampleValue::Count(c) => {
                    self.counters.increment_by(&key, c);
                }
                SampleValue::Value(v) => {
                    self.counters.increment(&key);
                    self.gauges.set(&key, v);
                }
            }
            processed += 1;
        }
        processed
    }

    pub fn snapshot(&self, key: &T) -> Snapshot<T> {
        Snapshot::new(
            key.clone(),
            self.counters.get(key),
            self.gauges.get(key),
            self.gauges.peak(key),
            self.latency_histograms.get(key),
            &self.percentiles,
        )
    }
}

/// Cheap, cloneable sending side of a [`Collector`].
#[derive(Debug, Clone)]
pub struct CollectorHandle<T> {
    sender: Sender<Sample<T>>,
}

impl<T: Clone + Send> CollectorHandle<T> {
    /// Queue a sample. If the collector is gone the sample is discarded.
    pub fn send(&self, sample: Sample<T>) {
        let _ = self.sender.send(sample);
    }

    pub fn send_elapsed(&self, key: T, d: Duration) {
        self.send(Sample::elapsed(key, d))
    }

    pub fn send_count(&self, key: T, c: u64) {
        self.send(Sample::count(key, c))
    }

    pub fn send_value(&self, key: T, v: u64) {
        self.send(Sample::value(key, v))
    }
}
