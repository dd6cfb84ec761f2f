use pqload_metrics::data::Snapshot;
use pqload_metrics::{Collector, Interest};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Connect,
    Handshake,
    Total,
    Elapsed,
    BytesSent,
    BytesReceived,
    CertSize,
}

static LATENCY_METRICS: &[Metric] = &[
    Metric::Connect,
    Metric::Handshake,
    Metric::Total,
    Metric::Elapsed,
];

static SIZE_METRICS: &[Metric] = &[Metric::BytesSent, Metric::BytesReceived, Metric::CertSize];

impl Metric {
    pub fn configure_collector(collector: &mut Collector<Metric>) {
        for m in LATENCY_METRICS {
            collector.register(Interest::Count(*m));
            collector.register(Interest::Gauge(*m));
            collector.register(Interest::LatencyPercentile(*m));
        }
        collector.register(Interest::Count(Metric::BytesSent));
        collector.register(Interest::Count(Metric::BytesReceived));
        collector.register(Interest::Count(Metric::CertSize));
        collector.register(Interest::Gauge(Metric::CertSize));
    }

    pub fn all_metrics(collector: &Collector<Metric>) -> Vec<Snapshot<Metric>> {
        LATENCY_METRICS
            .iter()
            .chain(SIZE_METRICS.iter())
            .map(|m| collector.snapshot(m))
            .collect()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", &self)
    }
}
