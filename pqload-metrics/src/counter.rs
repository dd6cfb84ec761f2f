use fnv::FnvHashMap;
use std::hash::Hash;

/// Monotonic totals keyed by metric: number of samples seen and the sum of
/// their counted values.
pub struct Counters<T> {
    data: FnvHashMap<T, u64>,
}

impl<T> Default for Counters<T>
where
    T: Hash + Eq,
{
    fn default() -> Self {
        Counters::new()
    }
}

impl<T> Counters<T>
where
    T: Hash + Eq,
{
    pub fn new() -> Counters<T> {
        Counters {
            data: FnvHashMap::default(),
        }
    }

    /// Register interest in the key and zero the counter
    pub fn init(&mut self, key: T) {
        self.data.insert(key, 0);
    }

    /// Add `val` to the counter. Unregistered keys are ignored.
    pub fn increment_by(&mut self, key: &T, val: u64) {
        if let Some(v) = self.data.get_mut(key) {
            *v = v.saturating_add(val);
        }
    }

    pub fn increment(&mut self, key: &T) {
        self.increment_by(key, 1);
    }

    pub fn get(&self, key: &T) -> Option<u64> {
        self.data.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_unregistered_keys() {
        let mut c: Counters<&str> = Counters::new();
        c.init("sent");
        c.increment_by(&"sent", 100);
        c.increment_by(&"sent", 50);
        c.increment(&"received");
        assert_eq!(c.get(&"sent"), Some(150));
        assert_eq!(c.get(&"received"), None);
    }
}
