use anyhow::{Context, Result};
use dogstatsd::{Client, Options};
use tracing::debug;

use super::Reporter;
use crate::collector::Batch;

/// Sends per-key deltas as DogStatsD counters, tagged with pid, name and cpu.
pub struct StatsdReporter {
    client: Client,
}

impl StatsdReporter {
    /// Counters are sent to `to_addr` as `<prefix>.<probe>`
    pub fn new(to_addr: impl Into<String>, prefix: impl Into<String>) -> Result<Self> {
        let to_addr = to_addr.into();
        let options = Options {
            from_addr: "0.0.0.0:0".into(),
            to_addr: to_addr.clone(),
            namespace: prefix.into(),
            default_tags: vec![],
            ..Options::default()
        };
        let client = Client::new(options).with_context(|| format!("unable to create statsd client for {to_addr}"))?;
        Ok(Self { client })
    }
}

impl Reporter for StatsdReporter {
    fn report(&mut self, batch: &Batch) -> Result<()> {
        let mut sent = 0;
        for r in batch.records.iter().filter(|r| r.delta > 0) {
            let delta = i64::try_from(r.delta).unwrap_or(i64::MAX);
            self.client
                .count(r.probe.as_str(), delta, &r.key().as_tags())
                .with_context(|| format!("sending {} counter for {}", r.probe, r.key()))?;
            sent += 1;
        }
        debug!("sent {} statsd counters for tick {}", sent, batch.tick);
        Ok(())
    }
}
