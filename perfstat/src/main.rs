use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::info;

use perfstat::args::{Commands, Opt};
use perfstat::client::init_logger;
use perfstat::client::run::RunUntil;
use perfstat::config::PerfstatConfig;
use perfstat::latency::DmaLatencyGuard;
use perfstat::probes::Event;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let opt = Opt::parse();
    match opt.command {
        Commands::Events {} => {
            for e in Event::ALL {
                println!("{:<20} {}", e.as_str(), e.description());
            }
        }
        Commands::Check { config } => {
            let config = PerfstatConfig::load(config.as_deref())?;
            config.validate()?;
            println!("{:#?}", config);
        }
        Commands::HoldLatency { value } => {
            let _guard = DmaLatencyGuard::acquire(value)?;
            signal::ctrl_c().await?;
            info!("exiting");
        }
        Commands::Run {
            config,
            interval_ms,
            sample_period,
            duration,
            probes,
            dma_latency,
        } => {
            let mut config = PerfstatConfig::load(config.as_deref())?;
            config.select_probes(&probes)?;
            if let Some(interval_ms) = interval_ms {
                config.collector.interval_ms = interval_ms;
            }
            if let Some(sample_period) = sample_period {
                for p in &mut config.probes {
                    p.sample_period = sample_period;
                }
            }
            config.validate()?;

            let _guard = dma_latency.map(DmaLatencyGuard::acquire).transpose()?;
            let until = match duration {
                Some(secs) => RunUntil::Elapsed(Duration::from_secs(secs)),
                None => RunUntil::CtrlC,
            };
            run(&config, until).await?;
        }
    }

    Ok(())
}

#[cfg(feature = "aya")]
async fn run(config: &PerfstatConfig, until: RunUntil) -> Result<()> {
    perfstat::client::run::run_until_exit(config, until).await?;
    Ok(())
}

#[cfg(not(feature = "aya"))]
async fn run(_config: &PerfstatConfig, _until: RunUntil) -> Result<()> {
    anyhow::bail!("perfstat was built without the `aya` feature, probes can't be attached")
}
