use thiserror::Error;
use tracing::info;

use crate::key::CounterEntry;
use crate::store::{CounterStore, StoreError};

#[cfg(feature = "aya")]
use aya::{maps::MapError, programs::ProgramError};

#[derive(Error, Debug)]
pub enum ProbeError {
    /// The counter map can't be read: probe detached, permission revoked, ...
    #[error("probe {probe} unavailable: {source}")]
    Unavailable {
        probe: String,
        #[source]
        source: StoreError,
    },
    #[cfg(feature = "aya")]
    #[error("program {program} not found in bpf object")]
    MissingProgram { program: String },
    #[cfg(feature = "aya")]
    #[error("map {map} not found in bpf object")]
    MissingMap { map: String },
    #[cfg(feature = "aya")]
    #[error("problem when loading program {program}: {source}")]
    Load {
        program: String,
        #[source]
        source: ProgramError,
    },
    #[cfg(feature = "aya")]
    #[error("problem when attaching program {program} to {event}: {source}")]
    Attach {
        program: String,
        event: String,
        #[source]
        source: ProgramError,
    },
    #[cfg(feature = "aya")]
    #[error("problem when opening map {map}: {source}")]
    Map {
        map: String,
        #[source]
        source: MapError,
    },
    #[cfg(feature = "aya")]
    #[error("unable to list online cpus: {0}")]
    OnlineCpus(#[source] std::io::Error),
}

/// Perf event links of an attached program, one per cpu. Dropping detaches.
#[cfg(feature = "aya")]
pub struct Attachment {
    pub(crate) links: Vec<aya::programs::perf_event::PerfEventLink>,
}

/// One attached probe and the counter store it writes to
pub struct ProbeHandle {
    name: String,
    store: Box<dyn CounterStore>,
    #[cfg(feature = "aya")]
    attachment: Option<Attachment>,
}

impl ProbeHandle {
    pub fn new(name: impl ToString, store: impl CounterStore + 'static) -> Self {
        Self {
            name: name.to_string(),
            store: Box::new(store),
            #[cfg(feature = "aya")]
            attachment: None,
        }
    }

    #[cfg(feature = "aya")]
    pub(crate) fn attached(name: impl ToString, store: impl CounterStore + 'static, attachment: Attachment) -> Self {
        Self {
            name: name.to_string(),
            store: Box::new(store),
            attachment: Some(attachment),
        }
    }

    /// Event label used in reports
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Everything written since the previous drain
    pub fn drain(&self) -> Result<Vec<CounterEntry>, ProbeError> {
        self.store
            .snapshot_and_clear()
            .map_err(|source| ProbeError::Unavailable {
                probe: self.name.clone(),
                source,
            })
    }

    pub fn dropped_samples(&self) -> u64 {
        self.store.dropped_samples()
    }

    /// Drain one last time, then release the store and the perf links.
    pub fn detach(self) -> Result<Vec<CounterEntry>, ProbeError> {
        let entries = self.drain();
        #[cfg(feature = "aya")]
        {
            if let Some(attachment) = &self.attachment {
                info!("detaching {} from {} cpus", self.name, attachment.links.len());
            }
        }
        info!("probe detached: {}", self.name);
        entries
    }
}

impl std::fmt::Debug for ProbeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeHandle").field("name", &self.name).finish()
    }
}
