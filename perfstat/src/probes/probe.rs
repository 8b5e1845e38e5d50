use serde::{Deserialize, Serialize};

use super::{Event, Scope};

fn default_sample_period() -> u64 {
    100
}

/// Configuration of one probe: which perf event, which program and map
/// of the bpf object, and how often the kernel samples it.
#[derive(Eq, Hash, PartialEq, Serialize, Deserialize, Clone, Debug)]
pub struct Probe {
    pub name: String,
    pub event: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    /// run the program every `sample_period` events
    #[serde(default = "default_sample_period")]
    pub sample_period: u64,
    #[serde(default)]
    pub scope: Scope,
}

impl Probe {
    pub fn new(event: Event) -> Self {
        Self {
            name: event.as_str().to_owned(),
            event,
            program: None,
            map: None,
            sample_period: default_sample_period(),
            scope: Scope::SystemWide,
        }
    }

    pub fn program(&self) -> &str {
        self.program.as_deref().unwrap_or(self.event.default_program())
    }

    pub fn map(&self) -> &str {
        self.map.as_deref().unwrap_or(self.event.default_map())
    }
}

#[cfg(feature = "aya")]
mod attach {
    use aya::programs::perf_event::{PerfEventScope, SamplePolicy};
    use aya::programs::PerfEvent;
    use aya::util::online_cpus;
    use aya::Ebpf;
    use tracing::{debug, info};

    use super::Probe;
    use crate::probes::handle::{Attachment, ProbeError, ProbeHandle};
    use crate::probes::Scope;
    use crate::store::KernelStore;

    impl Probe {
        /// Load the probe's program, attach it on every online cpu and take
        /// ownership of its counter map.
        pub fn attach(&self, ebpf: &mut Ebpf, capacity: usize) -> Result<ProbeHandle, ProbeError> {
            let program_name = self.program();
            let program: &mut PerfEvent = ebpf
                .program_mut(program_name)
                .ok_or_else(|| ProbeError::MissingProgram {
                    program: program_name.to_owned(),
                })?
                .try_into()
                .map_err(|source| ProbeError::Load {
                    program: program_name.to_owned(),
                    source,
                })?;
            program.load().map_err(|source| ProbeError::Load {
                program: program_name.to_owned(),
                source,
            })?;

            let mut links = vec![];
            for cpu in online_cpus().map_err(|(_, e)| ProbeError::OnlineCpus(e))? {
                let scope = match self.scope {
                    Scope::Pid { pid } => PerfEventScope::OneProcessOneCpu { cpu, pid },
                    Scope::SystemWide => PerfEventScope::AllProcessesOneCpu { cpu },
                };
                let attach_err = |source| ProbeError::Attach {
                    program: program_name.to_owned(),
                    event: self.event.to_string(),
                    source,
                };
                let link_id = program
                    .attach(
                        self.event.perf_type(),
                        self.event.config(),
                        scope,
                        SamplePolicy::Period(self.sample_period),
                        false,
                    )
                    .map_err(attach_err)?;
                links.push(program.take_link(link_id).map_err(attach_err)?);
                debug!("{} attached on cpu {}", program_name, cpu);
            }

            let map_name = self.map();
            let map = ebpf.take_map(map_name).ok_or_else(|| ProbeError::MissingMap {
                map: map_name.to_owned(),
            })?;
            let store = KernelStore::new(map_name, map, capacity).map_err(|source| ProbeError::Map {
                map: map_name.to_owned(),
                source,
            })?;

            info!("Probe attached: {} ({} on {} cpus)", self.name, self.event, links.len());
            Ok(ProbeHandle::attached(&self.name, store, Attachment { links }))
        }
    }
}
