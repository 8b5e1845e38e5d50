use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::info;

use crate::collector::{Collector, CollectorStats};
use crate::config::PerfstatConfig;
use crate::probes::ProbeHandle;
use crate::report::Reporter;

pub enum RunUntil {
    CtrlC,
    /// Ctrl-C or the duration, whichever comes first
    Elapsed(Duration),
}

impl RunUntil {
    async fn wait(self) -> Result<()> {
        match self {
            RunUntil::CtrlC => signal::ctrl_c().await?,
            RunUntil::Elapsed(duration) => {
                info!("Running for {:?}", duration);
                tokio::select! {
                    r = signal::ctrl_c() => r?,
                    _ = tokio::time::sleep(duration) => (),
                }
            }
        }
        Ok(())
    }
}

/// Collect from already attached probes until `until`, then stop the
/// collector, which drains and detaches them.
pub async fn collect_until(
    config: &PerfstatConfig,
    probes: Vec<ProbeHandle>,
    reporter: impl Reporter + 'static,
    until: RunUntil,
) -> Result<CollectorStats> {
    let mut collector = Collector::new(config.collector.options());
    collector.start(config.collector.interval(), probes, reporter)?;

    let waited = until.wait().await;
    info!("exiting");
    collector.stop().await?;
    waited?;

    Ok(collector.stats())
}

/// Load the bpf object, attach every configured probe and collect until `until`.
#[cfg(feature = "aya")]
pub async fn run_until_exit(config: &PerfstatConfig, until: RunUntil) -> Result<CollectorStats> {
    use anyhow::Context;

    use super::{bump_memlock_rlimit, ensure_root, load_bpf};

    config.validate()?;
    ensure_root()?;
    bump_memlock_rlimit()?;

    let mut bpf = load_bpf(&config.bpf_object)?;
    let mut probes = vec![];
    for probe in &config.probes {
        let handle = probe
            .attach(&mut bpf, config.collector.store_capacity)
            .with_context(|| format!("unable to attach probe {}", probe.name))?;
        probes.push(handle);
    }
    let reporter = config.reporter.build()?;

    let stats = collect_until(config, probes, reporter, until).await?;
    // probes are detached, the object can go
    drop(bpf);
    info!(
        "Collected {} ticks, {} records, {} dropped samples, {} report failures",
        stats.ticks, stats.records, stats.dropped_samples, stats.report_failures
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::key::CounterKey;
    use crate::report::ChannelReporter;
    use crate::store::{CounterStore, MemoryStore};

    #[tokio::test]
    async fn test_collect_until_elapsed() {
        let mut config = PerfstatConfig::default();
        config.collector.interval_ms = 10;

        let store = MemoryStore::default();
        store.upsert(CounterKey::new(0, 1234, "app"), 42).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let stats = collect_until(
            &config,
            vec![ProbeHandle::new("instructions", store.clone())],
            ChannelReporter::new(tx),
            RunUntil::Elapsed(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        let mut batches = vec![];
        while let Ok(b) = rx.try_recv() {
            batches.push(b);
        }
        assert_eq!(stats.ticks as usize, batches.len());
        assert!(batches.last().unwrap().final_drain);
        assert_eq!(batches.iter().map(|b| b.records.len()).sum::<usize>(), 1);
    }
}
