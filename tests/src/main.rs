use std::env::args;
use std::time::Duration;

use anyhow::Result;
use perfstat::collector::{CollectorOptions, Ticker};
use perfstat::report::{ChannelReporter, JsonReporter};
use perfstat::{Collector, CounterKey, CounterStore, MemoryStore, ProbeHandle};
use tokio::sync::mpsc;

/// Three probes, the second one loses its map on tick 2 and comes back on tick 3
fn flaky() -> Result<()> {
    let stores = [MemoryStore::default(), MemoryStore::default(), MemoryStore::default()];
    let probes = ["A", "B", "C"]
        .into_iter()
        .zip(&stores)
        .map(|(name, s)| ProbeHandle::new(name, s.clone()))
        .collect();
    let mut ticker = Ticker::new(probes, JsonReporter::stdout(), &CollectorOptions::default());

    for tick in 1..=3u64 {
        stores[1].set_unavailable(None);
        for s in &stores {
            s.upsert(CounterKey::new(0, 100, "app"), tick * 10)?;
            s.upsert(CounterKey::new(0, 0, "swapper/0"), tick)?;
        }
        if tick == 2 {
            stores[1].set_unavailable(Some("detached"));
        }
        let batch = ticker.tick();
        eprintln!("tick {}: {} records, unavailable: {:?}", batch.tick, batch.records.len(), batch.unavailable);
    }
    ticker.finish();
    Ok(())
}

/// Stop right after start, nothing but the final drain may run
async fn stop_immediately() -> Result<()> {
    let store = MemoryStore::default();
    store.upsert(CounterKey::new(1, 4242, "late"), 7)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut collector = Collector::new(CollectorOptions::default());
    collector.start(
        Duration::from_secs(3600),
        vec![ProbeHandle::new("instructions", store)],
        ChannelReporter::new(tx),
    )?;
    collector.stop().await?;

    let mut batches = 0;
    while let Some(batch) = rx.recv().await {
        batches += 1;
        println!("final_drain: {} records: {}", batch.final_drain, batch.records.len());
    }
    println!("batches: {}", batches);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let test = args().nth(1).expect("no input");
    match test.as_str() {
        "flaky" => flaky()?,
        "stop-immediately" => stop_immediately().await?,
        _ => {
            panic!("unknown scenario: {test}");
        }
    }

    Ok(())
}
