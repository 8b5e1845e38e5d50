use std::fmt;

use perfstat_common::{RawCounterKey, TASK_COMM_LEN};
use serde::{Deserialize, Serialize};

/// One measurement bucket of a counter map.
///
/// Ordering is by cpu, then pid, then name; batches rely on it to be
/// reproducible.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CounterKey {
    pub cpu: u32,
    pub pid: u32,
    pub name: String,
}

impl CounterKey {
    pub fn new(cpu: u32, pid: u32, name: impl AsRef<str>) -> Self {
        Self {
            cpu,
            pid,
            name: truncate_comm(name.as_ref()).to_owned(),
        }
    }

    /// pid 0 is the idle task / kernel context and is never reported
    pub fn is_idle(&self) -> bool {
        self.pid == 0
    }

    pub fn as_tags(&self) -> [String; 3] {
        [
            format!("pid:{}", self.pid),
            format!("name:{}", self.name),
            format!("cpu:{}", self.cpu),
        ]
    }
}

impl From<RawCounterKey> for CounterKey {
    fn from(raw: RawCounterKey) -> Self {
        Self {
            cpu: raw.cpu,
            pid: raw.pid,
            name: String::from_utf8_lossy(raw.comm()).into_owned(),
        }
    }
}

impl From<&CounterKey> for RawCounterKey {
    fn from(key: &CounterKey) -> Self {
        RawCounterKey::new(key.cpu, key.pid, key.name.as_bytes())
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@cpu{}", self.name, self.pid, self.cpu)
    }
}

/// Clamp to what fits in `task_struct::comm` without splitting a char
fn truncate_comm(name: &str) -> &str {
    let max = TASK_COMM_LEN - 1;
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// A key together with the latest value read for it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterEntry {
    pub key: CounterKey,
    pub value: u64,
}

impl CounterEntry {
    pub fn new(key: CounterKey, value: u64) -> Self {
        Self { key, value }
    }
}
