//! PM QoS request through `/dev/cpu_dma_latency`.
//!
//! While the file is held open the kernel keeps cpus out of idle states whose
//! exit latency exceeds the requested value, so counters aren't skewed by
//! deep C-states during a measurement. Closing the file drops the request.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

pub const CPU_DMA_LATENCY: &str = "/dev/cpu_dma_latency";

#[derive(Debug)]
pub struct DmaLatencyGuard {
    _file: File,
    latency_us: u32,
}

impl DmaLatencyGuard {
    pub fn acquire(latency_us: u32) -> Result<Self> {
        Self::acquire_at(CPU_DMA_LATENCY, latency_us)
    }

    pub fn acquire_at<P: AsRef<Path>>(path: P, latency_us: u32) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("unable to open {path:?}"))?;
        file.write_all(&latency_us.to_ne_bytes())
            .with_context(|| format!("unable to write latency to {path:?}"))?;
        info!("holding cpu dma latency at {}us", latency_us);
        Ok(Self {
            _file: file,
            latency_us,
        })
    }

    pub fn latency_us(&self) -> u32 {
        self.latency_us
    }
}

impl Drop for DmaLatencyGuard {
    fn drop(&mut self) {
        info!("releasing cpu dma latency request");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_native_endian_u32() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpu_dma_latency");
        std::fs::write(&path, []).unwrap();

        let guard = DmaLatencyGuard::acquire_at(&path, 20).unwrap();
        assert_eq!(guard.latency_us(), 20);
        drop(guard);

        assert_eq!(std::fs::read(&path).unwrap(), 20u32.to_ne_bytes());
    }

    #[test]
    fn test_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DmaLatencyGuard::acquire_at(dir.path().join("nope"), 0).is_err());
    }
}
