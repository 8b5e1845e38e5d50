use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use tracing::debug;

use crate::key::CounterKey;

#[derive(Debug, Clone, Copy)]
struct Baseline {
    value: u64,
    seen: Instant,
}

/// Last value seen per (probe, key), used to turn cumulative counter
/// readings into per-interval deltas.
#[derive(Debug)]
pub struct Baselines {
    probes: FnvHashMap<String, FnvHashMap<CounterKey, Baseline>>,
    ttl: Duration,
}

impl Baselines {
    pub fn new(ttl: Duration) -> Self {
        Self {
            probes: FnvHashMap::default(),
            ttl,
        }
    }

    /// Record `value` for `key` and return the increase since the last
    /// reading. The first reading counts from zero; a reading below the
    /// baseline means the counter restarted and yields 0.
    pub fn update(&mut self, probe: &str, key: &CounterKey, value: u64, now: Instant) -> u64 {
        let seen = Baseline { value, seen: now };
        let keys = match self.probes.get_mut(probe) {
            Some(keys) => keys,
            None => {
                let mut keys = FnvHashMap::default();
                keys.insert(key.clone(), seen);
                self.probes.insert(probe.to_owned(), keys);
                return value;
            }
        };

        match keys.insert(key.clone(), seen) {
            Some(prev) => value.checked_sub(prev.value).unwrap_or_else(|| {
                debug!("{probe} counter for {key} went backwards: {} -> {value}", prev.value);
                0
            }),
            None => value,
        }
    }

    /// Forget keys not seen within the ttl
    pub fn evict(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut evicted = 0;
        for keys in self.probes.values_mut() {
            let before = keys.len();
            keys.retain(|_, b| now.saturating_duration_since(b.seen) < ttl);
            evicted += before - keys.len();
        }
        self.probes.retain(|_, keys| !keys.is_empty());
        evicted
    }

    pub fn len(&self) -> usize {
        self.probes.values().map(|k| k.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas() {
        let mut b = Baselines::new(Duration::from_secs(3600));
        let key = CounterKey::new(0, 100, "a");
        let now = Instant::now();

        assert_eq!(b.update("instructions", &key, 500, now), 500);
        assert_eq!(b.update("instructions", &key, 800, now), 300);
        assert_eq!(b.update("instructions", &key, 800, now), 0);
        // same key under another probe has its own baseline
        assert_eq!(b.update("cache-misses", &key, 10, now), 10);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_counter_restart() {
        let mut b = Baselines::new(Duration::from_secs(3600));
        let key = CounterKey::new(0, 100, "a");
        let now = Instant::now();

        b.update("instructions", &key, 1000, now);
        assert_eq!(b.update("instructions", &key, 40, now), 0);
        assert_eq!(b.update("instructions", &key, 100, now), 60);
    }

    #[test]
    fn test_evict() {
        let mut b = Baselines::new(Duration::from_secs(10));
        let start = Instant::now();
        b.update("instructions", &CounterKey::new(0, 1, "old"), 1, start);
        b.update("instructions", &CounterKey::new(0, 2, "new"), 1, start + Duration::from_secs(8));

        assert_eq!(b.evict(start + Duration::from_secs(5)), 0);
        assert_eq!(b.evict(start + Duration::from_secs(12)), 1);
        assert_eq!(b.len(), 1);

        // evicted keys start over from zero
        assert_eq!(b.update("instructions", &CounterKey::new(0, 1, "old"), 7, start + Duration::from_secs(12)), 7);
    }

    #[test]
    fn test_probe_seen_again_after_full_eviction() {
        let mut b = Baselines::new(Duration::from_secs(10));
        let start = Instant::now();
        let key = CounterKey::new(0, 1, "app");
        b.update("cache-misses", &key, 40, start);

        assert_eq!(b.evict(start + Duration::from_secs(20)), 1);
        assert!(b.is_empty());

        let later = start + Duration::from_secs(21);
        assert_eq!(b.update("cache-misses", &key, 50, later), 50);
        assert_eq!(b.update("cache-misses", &key, 65, later), 15);
        assert_eq!(b.len(), 1);
    }
}
