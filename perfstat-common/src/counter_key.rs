use crate::TASK_COMM_LEN;

/// Key of the kernel counter maps.
///
/// Filled by the probes from `bpf_get_smp_processor_id`, the lower half of
/// `bpf_get_current_pid_tgid` and `bpf_get_current_comm`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RawCounterKey {
    pub cpu: u32,
    pub pid: u32,
    pub name: [u8; TASK_COMM_LEN],
}

impl RawCounterKey {
    pub fn new(cpu: u32, pid: u32, comm: &[u8]) -> Self {
        let mut name = [0u8; TASK_COMM_LEN];
        // keep the last byte as terminator, same as the kernel does
        let len = comm.len().min(TASK_COMM_LEN - 1);
        name[..len].copy_from_slice(&comm[..len]);
        Self { cpu, pid, name }
    }

    /// The comm bytes up to the first NUL
    pub fn comm(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&c| c == b'\0')
            .unwrap_or(self.name.len());
        &self.name[..end]
    }
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for RawCounterKey {}
