use fnv::FnvHashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Reading {
    last: u64,
    peak: u64,
}

/// Last observed value per metric, along with the highest value seen since
/// registration.
pub struct Gauges<T> {
    data: FnvHashMap<T, Option<Reading>>,
}

impl<T> Default for Gauges<T>
where
    T: Hash + Eq,
{
    fn default() -> Self {
        Gauges::new()
    }
}

impl<T> Gauges<T>
where
    T: Hash + Eq,
{
    pub fn new() -> Gauges<T> {
        Gauges {
            data: FnvHashMap::default(),
        }
    }

    /// Register an interest. The gauge reads as empty until the first `set`.
    pub fn init(&mut self, key: T) {
        self.data.insert(key, None);
    }

    /// Record a new value. Unregistered keys are ignored.
    pub fn set(&mut self, key: &T, val: u64) {
        if let Some(slot) = self.data.get_mut(key) {
            let peak = slot.map(|r| r.peak.max(val)).unwrap_or(val);
            *slot = Some(Reading { last: val, peak });
        }
    }

    pub fn get(&self, key: &T) -> Option<u64> {
        self.data.get(key).and_then(|r| r.map(|r| r.last))
    }

    pub fn peak(&self, key: &T) -> Option<u64> {
        self.data.get(key).and_then(|r| r.map(|r| r.peak))
    }
}
