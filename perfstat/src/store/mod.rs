//! Counter stores: the user space view of a kernel counter map.

use thiserror::Error;

use crate::key::{CounterEntry, CounterKey};

#[cfg_attr(not(feature = "aya"), allow(dead_code))]
mod drain;
pub mod memory;
#[cfg(feature = "aya")]
pub mod kernel;

pub use memory::MemoryStore;
#[cfg(feature = "aya")]
pub use kernel::KernelStore;

#[cfg(feature = "aya")]
pub(crate) use drain::{drain_entries, EntryMap};

#[derive(Error, Debug)]
pub enum StoreError {
    /// The store is full and `key` was not already present. The sample is dropped.
    #[error("counter store is full ({capacity} entries), dropped sample for {key}")]
    CapacityExceeded { key: CounterKey, capacity: usize },
    /// The backing map can't be read or written anymore
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Mapping from [`CounterKey`] to the latest counter value read for it.
///
/// Updates overwrite, they never accumulate. Implementations use interior
/// mutability since the kernel side writes concurrently with us.
pub trait CounterStore: Send + Sync {
    /// Insert or overwrite the value for `key`.
    fn upsert(&self, key: CounterKey, value: u64) -> Result<(), StoreError>;

    /// All current entries, in no particular order.
    fn snapshot(&self) -> Result<Vec<CounterEntry>, StoreError>;

    /// Remove all entries.
    fn clear(&self) -> Result<(), StoreError>;

    /// Read every entry and remove it, as one step.
    fn snapshot_and_clear(&self) -> Result<Vec<CounterEntry>, StoreError>;

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.snapshot()?.len())
    }

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Number of upserts rejected with [`StoreError::CapacityExceeded`] so far
    fn dropped_samples(&self) -> u64 {
        0
    }
}
