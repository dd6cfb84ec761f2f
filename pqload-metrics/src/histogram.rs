use fnv::FnvHashMap;
use hdrhistogram::Histogram;
use std::hash::Hash;

/// Three significant figures keeps microsecond latencies exact up to ~1ms
/// and within 0.1% beyond that.
const SIGNIFICANT_FIGURES: u8 = 3;

/// Latency distributions per metric, in microseconds.
pub struct Histograms<T> {
    data: FnvHashMap<T, Histogram<u64>>,
}

impl<T> Default for Histograms<T>
where
    T: Hash + Eq,
{
    fn default() -> Self {
        Histograms::new()
    }
}

impl<T> Histograms<T>
where
    T: Hash + Eq,
{
    pub fn new() -> Histograms<T> {
        Histograms {
            data: FnvHashMap::default(),
        }
    }

    /// Register interest in the key with an empty, auto-resizing histogram.
    pub fn init(&mut self, key: T) {
        if let Ok(h) = Histogram::new(SIGNIFICANT_FIGURES) {
            self.data.insert(key, h);
        }
    }

    pub fn record(&mut self, key: &T, micros: u64) {
        if let Some(h) = self.data.get_mut(key) {
            h.saturating_record(micros);
        }
    }

    /// The histogram for `key`, if registered and non-empty.
    pub fn get(&self, key: &T) -> Option<&Histogram<u64>> {
        self.data.get(key).filter(|h| !h.is_empty())
    }
}
