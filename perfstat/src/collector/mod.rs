//! Periodic draining of probe counter maps.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::key::CounterEntry;
use crate::probes::{ProbeError, ProbeHandle};
use crate::report::Reporter;

pub mod baseline;
pub mod batch;

pub use baseline::Baselines;
pub use batch::{Batch, Record};

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("collector is {0:?}, expected Idle")]
    InvalidState(CollectorState),
    #[error("collector task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Clone, Debug)]
pub struct CollectorOptions {
    /// entries with a lower pid are not reported; never below 1
    pub min_pid: u32,
    /// baselines not refreshed for this long are forgotten
    pub baseline_ttl: Duration,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            min_pid: 1,
            baseline_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// batches built, including the final drain
    pub ticks: u64,
    pub records: u64,
    /// sum over ticks of probes that failed to drain
    pub unavailable: u64,
    pub dropped_samples: u64,
    pub report_failures: u64,
}

/// Builds and reports batches from a fixed set of probes. Ticks are run
/// one at a time by whoever owns it.
pub struct Ticker {
    probes: Vec<ProbeHandle>,
    reporter: Box<dyn Reporter>,
    baselines: Baselines,
    min_pid: u32,
    tick: u64,
    dropped: Vec<u64>,
    stats: Arc<Mutex<CollectorStats>>,
}

impl Ticker {
    pub fn new(probes: Vec<ProbeHandle>, reporter: impl Reporter + 'static, options: &CollectorOptions) -> Self {
        let dropped = vec![0; probes.len()];
        Self {
            probes,
            reporter: Box::new(reporter),
            baselines: Baselines::new(options.baseline_ttl),
            min_pid: options.min_pid.max(1),
            tick: 0,
            dropped,
            stats: Default::default(),
        }
    }

    pub fn stats(&self) -> CollectorStats {
        self.stats.lock().clone()
    }

    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Drain every probe in registration order and report the batch.
    pub fn tick(&mut self) -> Batch {
        let drained = self
            .probes
            .iter()
            .map(|p| (p.name().to_owned(), p.drain(), p.dropped_samples()))
            .collect();
        let batch = self.build(drained, false);
        self.report(&batch);
        batch
    }

    /// Final drain: detach every probe, report what they still held and
    /// flush the reporter.
    pub fn finish(mut self) -> Batch {
        let drained = std::mem::take(&mut self.probes)
            .into_iter()
            .map(|p| {
                let dropped = p.dropped_samples();
                (p.name().to_owned(), p.detach(), dropped)
            })
            .collect();
        let batch = self.build(drained, true);
        self.report(&batch);
        if let Err(e) = self.reporter.flush() {
            error!("flushing reporter failed: {:#}", e);
        }
        batch
    }

    fn build(&mut self, drained: Vec<(String, Result<Vec<CounterEntry>, ProbeError>, u64)>, final_drain: bool) -> Batch {
        self.tick += 1;
        let now = Instant::now();
        let timestamp_ms = batch::unix_ms(SystemTime::now());
        let mut batch = Batch::new(self.tick, timestamp_ms, final_drain);

        for (i, (name, result, dropped)) in drained.into_iter().enumerate() {
            let prev = std::mem::replace(&mut self.dropped[i], dropped);
            let new_drops = dropped.saturating_sub(prev);
            if new_drops > 0 {
                warn!("{}: {} samples dropped, counter store full", name, new_drops);
            }
            batch.dropped_samples += new_drops;

            match result {
                Ok(mut entries) => {
                    entries.retain(|e| e.key.pid >= self.min_pid);
                    entries.sort_by(|a, b| a.key.cmp(&b.key));
                    for e in entries {
                        let delta = self.baselines.update(&name, &e.key, e.value, now);
                        batch.records.push(Record::new(&name, e, delta, timestamp_ms));
                    }
                }
                Err(e) => {
                    warn!("tick {}: {}", self.tick, e);
                    batch.unavailable.push(name);
                }
            }
        }
        self.baselines.evict(now);

        let mut stats = self.stats.lock();
        stats.ticks += 1;
        stats.records += batch.records.len() as u64;
        stats.unavailable += batch.unavailable.len() as u64;
        stats.dropped_samples += batch.dropped_samples;
        batch
    }

    fn report(&mut self, batch: &Batch) {
        if let Err(e) = self.reporter.report(batch) {
            error!("reporting tick {} failed: {:#}", batch.tick, e);
            self.stats.lock().report_failures += 1;
        }
    }
}

/// Runs a [`Ticker`] every `interval` on a tokio task.
///
/// `Idle -> Running` on [`Collector::start`], `Running -> Stopping -> Stopped`
/// on [`Collector::stop`], which performs one final drain of all probes.
pub struct Collector {
    options: CollectorOptions,
    state: Arc<Mutex<CollectorState>>,
    stats: Arc<Mutex<CollectorStats>>,
    stop_tx: Option<watch::Sender<()>>,
    task: Option<JoinHandle<Result<Batch, CollectorError>>>,
}

impl Collector {
    pub fn new(options: CollectorOptions) -> Self {
        Self {
            options,
            state: Arc::new(Mutex::new(CollectorState::Idle)),
            stats: Default::default(),
            stop_tx: None,
            task: None,
        }
    }

    pub fn state(&self) -> CollectorState {
        *self.state.lock()
    }

    pub fn stats(&self) -> CollectorStats {
        self.stats.lock().clone()
    }

    /// Must be called from within a tokio runtime.
    pub fn start(
        &mut self,
        interval: Duration,
        probes: Vec<ProbeHandle>,
        reporter: impl Reporter + 'static,
    ) -> Result<(), CollectorError> {
        let state = self.state();
        if state != CollectorState::Idle {
            return Err(CollectorError::InvalidState(state));
        }
        validate(interval, &probes)?;

        let ticker = Ticker::new(probes, reporter, &self.options);
        self.stats = Arc::clone(&ticker.stats);
        info!(
            "collector started: every {:?}, probes: {}",
            interval,
            ticker.probe_names().join(", ")
        );

        let (stop_tx, stop_rx) = watch::channel(());
        self.stop_tx = Some(stop_tx);
        self.task = Some(tokio::spawn(run(ticker, interval, stop_rx)));
        *self.state.lock() = CollectorState::Running;
        Ok(())
    }

    /// Abort the interval wait, let a tick in progress complete, drain every
    /// probe one last time and detach them. No-op unless running.
    ///
    /// If this future is dropped before it completes, the collector is still
    /// left `Stopped` and the final drain finishes in the background.
    pub async fn stop(&mut self) -> Result<Option<Batch>, CollectorError> {
        if self.state() != CollectorState::Running {
            return Ok(None);
        }
        *self.state.lock() = CollectorState::Stopping;
        let _stopped = StoppedOnDrop(Arc::clone(&self.state));
        info!("collector stopping");

        if let Some(stop_tx) = self.stop_tx.take() {
            // the task may already be gone; join below tells us
            let _ = stop_tx.send(());
        }
        let result = match self.task.take() {
            Some(task) => task.await?.map(Some),
            None => Ok(None),
        };

        let stats = self.stats();
        info!(
            "collector stopped after {} ticks, {} records, {} dropped samples",
            stats.ticks, stats.records, stats.dropped_samples
        );
        result
    }
}

struct StoppedOnDrop(Arc<Mutex<CollectorState>>);

impl Drop for StoppedOnDrop {
    fn drop(&mut self) {
        *self.0.lock() = CollectorState::Stopped;
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            warn!("collector dropped while running, final drain skipped");
            task.abort();
        }
    }
}

fn validate(interval: Duration, probes: &[ProbeHandle]) -> Result<(), CollectorError> {
    if interval.is_zero() {
        return Err(CollectorError::InvalidConfiguration("interval must be greater than zero".into()));
    }
    if probes.is_empty() {
        return Err(CollectorError::InvalidConfiguration("no probes to collect from".into()));
    }
    let mut names = HashSet::new();
    for p in probes {
        if !names.insert(p.name()) {
            return Err(CollectorError::InvalidConfiguration(format!("duplicate probe name: {}", p.name())));
        }
    }
    Ok(())
}

/// Roughly 30 years, used when `now + interval` can't be represented
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Ticks touch bpf maps, sockets and files, so they run on the blocking pool.
async fn run(mut ticker: Ticker, interval: Duration, mut stop_rx: watch::Receiver<()>) -> Result<Batch, CollectorError> {
    let now = tokio::time::Instant::now();
    let start = now.checked_add(interval).unwrap_or_else(|| now + FAR_FUTURE);
    let mut ticks = interval_at(start, interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // a dropped sender also means stop
            _ = stop_rx.changed() => break,
            _ = ticks.tick() => {
                ticker = task::spawn_blocking(move || {
                    ticker.tick();
                    ticker
                })
                .await?;
            }
        }
    }

    Ok(task::spawn_blocking(move || ticker.finish()).await?)
}
