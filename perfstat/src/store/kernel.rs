use std::error::Error as _;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use aya::maps::{HashMap, Map, MapData, MapError};
use parking_lot::Mutex;
use perfstat_common::RawCounterKey;
use tracing::debug;

use super::{drain_entries, CounterStore, EntryMap, StoreError};
use crate::key::{CounterEntry, CounterKey};

/// Counter store backed by a BPF hash map `RawCounterKey -> u64`.
///
/// The kernel only offers atomic per-entry operations, so
/// [`CounterStore::snapshot_and_clear`] reads every entry and then deletes the
/// keys it read, see [`drain_entries`]. A key the probe overwrites between the
/// two steps loses that newer value; keys created in that window are kept for
/// the next drain.
pub struct KernelStore {
    name: String,
    map: Mutex<HashMap<MapData, RawCounterKey, u64>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl KernelStore {
    /// `capacity` is the `max_entries` the map was declared with
    pub fn new(name: impl ToString, map: Map, capacity: usize) -> Result<Self, MapError> {
        let map: HashMap<MapData, RawCounterKey, u64> = HashMap::try_from(map)?;
        Ok(Self {
            name: name.to_string(),
            map: Mutex::new(map),
            capacity,
            dropped: AtomicU64::new(0),
        })
    }

    fn unavailable(&self, e: MapError) -> StoreError {
        StoreError::Unavailable(format!("map {}: {}", self.name, e))
    }

    fn read_all(&self, map: &HashMap<MapData, RawCounterKey, u64>) -> Result<Vec<(RawCounterKey, u64)>, StoreError> {
        map.entries().map_err(|e| self.unavailable(e))
    }
}

/// errno of the failed bpf syscall behind `e`, if any
fn os_error(e: &MapError) -> Option<i32> {
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return io_err.raw_os_error();
        }
        source = err.source();
    }
    None
}

/// `E2BIG`/`ENOMEM` from `bpf_map_update_elem` mean the map is full
fn is_full(e: &MapError) -> bool {
    matches!(os_error(e), Some(libc::E2BIG) | Some(libc::ENOMEM))
}

impl CounterStore for KernelStore {
    fn upsert(&self, key: CounterKey, value: u64) -> Result<(), StoreError> {
        let raw = RawCounterKey::from(&key);
        match self.map.lock().insert(raw, value, 0) {
            Ok(()) => Ok(()),
            Err(e) if is_full(&e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(StoreError::CapacityExceeded { key, capacity: self.capacity })
            }
            Err(e) => Err(self.unavailable(e)),
        }
    }

    fn snapshot(&self) -> Result<Vec<CounterEntry>, StoreError> {
        let map = self.map.lock();
        Ok(self
            .read_all(&map)?
            .into_iter()
            .map(|(k, v)| CounterEntry::new(k.into(), v))
            .collect())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut map = self.map.lock();
        let keys = map
            .keys()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.unavailable(e))?;
        for k in keys {
            remove_key(&mut map, &k).map_err(|e| self.unavailable(e))?;
        }
        Ok(())
    }

    fn snapshot_and_clear(&self) -> Result<Vec<CounterEntry>, StoreError> {
        let mut map = self.map.lock();
        let entries = drain_entries(&mut *map, &self.name).map_err(|e| self.unavailable(e))?;
        debug!("drained {} entries from {}", entries.len(), self.name);
        Ok(entries
            .into_iter()
            .map(|(k, v)| CounterEntry::new(k.into(), v))
            .collect())
    }

    fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EntryMap for HashMap<MapData, RawCounterKey, u64> {
    type Key = RawCounterKey;
    type Error = MapError;

    fn entries(&self) -> Result<Vec<(RawCounterKey, u64)>, MapError> {
        self.iter().collect()
    }

    fn remove(&mut self, key: &RawCounterKey) -> Result<(), MapError> {
        remove_key(self, key)
    }
}

/// Deleting a key the kernel already removed is not an error
fn remove_key(map: &mut HashMap<MapData, RawCounterKey, u64>, key: &RawCounterKey) -> Result<(), MapError> {
    match map.remove(key) {
        Ok(()) | Err(MapError::KeyNotFound) => Ok(()),
        Err(e) if os_error(&e) == Some(libc::ENOENT) => Ok(()),
        Err(e) => Err(e),
    }
}
