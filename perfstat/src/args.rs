use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
pub struct Opt {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Attach the probes and report their counters every interval
    Run {
        /// Config file, defaults to Perfstat.toml if present
        #[clap(short, long)]
        config: Option<PathBuf>,
        /// Collection interval in milliseconds
        #[clap(short, long)]
        interval_ms: Option<u64>,
        /// Sample one in this many events
        #[clap(short = 'c', long)]
        sample_period: Option<u64>,
        /// Duration in seconds to run, until Ctrl-C if not supplied
        #[clap(short, long)]
        duration: Option<u64>,
        /// Only attach these probes (configured names or event names)
        #[clap(short, long = "probe")]
        probes: Vec<String>,
        /// Hold /dev/cpu_dma_latency at this value (us) while collecting
        #[clap(long)]
        dma_latency: Option<u32>,
    },
    /// Load and validate the config
    Check {
        #[clap(short, long)]
        config: Option<PathBuf>,
    },
    /// List supported events
    Events {},
    /// Hold /dev/cpu_dma_latency at a value until Ctrl-C
    HoldLatency {
        /// latency in microseconds
        #[clap(short, long, default_value_t = 0)]
        value: u32,
    },
}
