mod active;
mod collector;
mod counter;
mod gauge;
mod histogram;
mod sample;
mod snapshots;
mod stopwatch;
mod util;

pub use self::active::{ActiveRequests, InFlight};
pub use self::collector::{Collector, CollectorHandle, Interest};
pub use self::stopwatch::Stopwatch;
pub mod data {
    pub use crate::sample::{Sample, SampleValue};
    pub use crate::snapshots::{HistoSnapshot, Percentile, Snapshot};
}
