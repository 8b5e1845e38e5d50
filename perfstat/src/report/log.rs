use anyhow::Result;
use tracing::{debug, info, warn};

use super::Reporter;
use crate::collector::Batch;

/// Writes batches to the tracing log
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, batch: &Batch) -> Result<()> {
        info!(
            tick = batch.tick,
            records = batch.records.len(),
            dropped = batch.dropped_samples,
            final_drain = batch.final_drain,
            "collected"
        );
        if !batch.unavailable.is_empty() {
            warn!(tick = batch.tick, "unavailable probes: {}", batch.unavailable.join(", "));
        }
        for r in &batch.records {
            debug!(
                "{:<16} {:<8} {:<8} {:<16} {:<12} +{}",
                r.probe, r.pid, r.cpu, r.name, r.value, r.delta
            );
        }
        Ok(())
    }
}
