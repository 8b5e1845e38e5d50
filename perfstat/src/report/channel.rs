use anyhow::{anyhow, Result};
use tokio::sync::mpsc::UnboundedSender;

use super::Reporter;
use crate::collector::Batch;

/// Hands batches to an in-process consumer
pub struct ChannelReporter {
    tx: UnboundedSender<Batch>,
}

impl ChannelReporter {
    pub fn new(tx: UnboundedSender<Batch>) -> Self {
        Self { tx }
    }
}

impl Reporter for ChannelReporter {
    fn report(&mut self, batch: &Batch) -> Result<()> {
        self.tx
            .send(batch.clone())
            .map_err(|_| anyhow!("batch receiver dropped"))
    }
}
