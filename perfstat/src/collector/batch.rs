use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::key::{CounterEntry, CounterKey};

/// One counter reading of one probe, as handed to reporters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub probe: String,
    pub cpu: u32,
    pub pid: u32,
    pub name: String,
    /// latest value read by the probe
    pub value: u64,
    /// increase since the previous reading of the same key
    pub delta: u64,
    pub timestamp_ms: u64,
}

impl Record {
    pub fn new(probe: &str, entry: CounterEntry, delta: u64, timestamp_ms: u64) -> Self {
        let CounterEntry { key: CounterKey { cpu, pid, name }, value } = entry;
        Self {
            probe: probe.to_owned(),
            cpu,
            pid,
            name,
            value,
            delta,
            timestamp_ms,
        }
    }

    pub fn key(&self) -> CounterKey {
        CounterKey {
            cpu: self.cpu,
            pid: self.pid,
            name: self.name.clone(),
        }
    }
}

/// Everything collected in one tick.
///
/// Records are ordered by probe registration order, then by key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub tick: u64,
    pub timestamp_ms: u64,
    pub records: Vec<Record>,
    /// probes whose map couldn't be drained this tick
    pub unavailable: Vec<String>,
    /// samples rejected by full stores since the previous tick
    pub dropped_samples: u64,
    /// produced by the drain performed when the collector stops
    pub final_drain: bool,
}

impl Batch {
    pub fn new(tick: u64, timestamp_ms: u64, final_drain: bool) -> Self {
        Self {
            tick,
            timestamp_ms,
            final_drain,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records_of<'a>(&'a self, probe: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| r.probe == probe)
    }
}

pub(crate) fn unix_ms(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
