pub mod args;
pub mod client;
pub mod collector;
pub mod config;
pub mod key;
pub mod latency;
pub mod probes;
pub mod report;
pub mod store;

pub use crate::collector::{Batch, Collector, CollectorError, CollectorState, Record};
pub use crate::key::{CounterEntry, CounterKey};
pub use crate::probes::{ProbeError, ProbeHandle};
pub use crate::store::{CounterStore, MemoryStore, StoreError};
