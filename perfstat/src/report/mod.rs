//! Sinks for collected batches.

use anyhow::Result;

use crate::collector::Batch;

pub mod channel;
pub mod json;
pub mod log;
pub mod statsd;

pub use channel::ChannelReporter;
pub use json::JsonReporter;
pub use log::LogReporter;
pub use statsd::StatsdReporter;

/// Receives one batch per collector tick.
///
/// Errors are logged by the collector and never stop it.
pub trait Reporter: Send {
    fn report(&mut self, batch: &Batch) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn report(&mut self, batch: &Batch) -> Result<()> {
        (**self).report(batch)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
