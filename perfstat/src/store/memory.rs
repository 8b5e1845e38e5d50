use std::sync::Arc;

use fnv::FnvHashMap;
use parking_lot::Mutex;

use super::{CounterStore, StoreError};
use crate::key::{CounterEntry, CounterKey};

#[derive(Debug)]
struct Inner {
    entries: FnvHashMap<CounterKey, u64>,
    capacity: usize,
    dropped: u64,
    unavailable: Option<String>,
}

/// In-process counter store with the same contract as a kernel hash map.
///
/// Cloning gives another handle to the same entries, the way a map fd is
/// shared between the probe writing to it and the collector draining it.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: FnvHashMap::default(),
                capacity,
                dropped: 0,
                unavailable: None,
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Make every operation fail with [`StoreError::Unavailable`] until
    /// called again with `None`. Entries written before are kept.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.inner.lock().unavailable = reason.map(ToOwned::to_owned);
    }

    fn check(inner: &Inner) -> Result<(), StoreError> {
        match &inner.unavailable {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn entries(inner: &Inner) -> Vec<CounterEntry> {
        inner
            .entries
            .iter()
            .map(|(k, v)| CounterEntry::new(k.clone(), *v))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_capacity(perfstat_common::COUNTER_MAP_ENTRIES as usize)
    }
}

impl CounterStore for MemoryStore {
    fn upsert(&self, key: CounterKey, value: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&inner)?;

        if let Some(v) = inner.entries.get_mut(&key) {
            *v = value;
            return Ok(());
        }
        if inner.entries.len() >= inner.capacity {
            inner.dropped += 1;
            return Err(StoreError::CapacityExceeded {
                key,
                capacity: inner.capacity,
            });
        }
        inner.entries.insert(key, value);
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<CounterEntry>, StoreError> {
        let inner = self.inner.lock();
        Self::check(&inner)?;
        Ok(Self::entries(&inner))
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&inner)?;
        inner.entries.clear();
        Ok(())
    }

    fn snapshot_and_clear(&self) -> Result<Vec<CounterEntry>, StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&inner)?;
        Ok(inner
            .entries
            .drain()
            .map(|(k, v)| CounterEntry::new(k, v))
            .collect())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let inner = self.inner.lock();
        Self::check(&inner)?;
        Ok(inner.entries.len())
    }

    fn dropped_samples(&self) -> u64 {
        self.inner.lock().dropped
    }
}
