use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs::File, io::Read};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::collector::{CollectorError, CollectorOptions};
use crate::probes::{Event, Probe};
use crate::report::{JsonReporter, LogReporter, Reporter, StatsdReporter};

pub const DEFAULT_CONFIG: &str = "Perfstat.toml";

#[derive(Deserialize, Debug, Clone)]
pub struct PerfstatConfig {
    /// compiled probes, loaded with aya
    #[serde(default = "default_bpf_object")]
    pub bpf_object: PathBuf,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default = "default_probes")]
    pub probes: Vec<Probe>,
    #[serde(default)]
    pub reporter: ReporterConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CollectorConfig {
    pub interval_ms: u64,
    pub min_pid: u32,
    pub baseline_ttl_secs: u64,
    pub store_capacity: usize,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ReporterConfig {
    Log,
    Json {
        /// stdout when not set
        path: Option<PathBuf>,
    },
    Statsd {
        #[serde(default = "default_statsd_host")]
        host: String,
        #[serde(default = "default_statsd_port")]
        port: u16,
        #[serde(default = "default_statsd_prefix")]
        prefix: String,
    },
}

fn default_bpf_object() -> PathBuf {
    PathBuf::from("target/bpfel-unknown-none/release/perfstat")
}

/// The two stock probes: instructions retired and cache misses
fn default_probes() -> Vec<Probe> {
    vec![Probe::new(Event::Instructions), Probe::new(Event::CacheMisses)]
}

fn default_statsd_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_statsd_port() -> u16 {
    8125
}

fn default_statsd_prefix() -> String {
    "perfstat".to_owned()
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            min_pid: 1,
            baseline_ttl_secs: 3600,
            store_capacity: perfstat_common::COUNTER_MAP_ENTRIES as usize,
        }
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn options(&self) -> CollectorOptions {
        CollectorOptions {
            min_pid: self.min_pid.max(1),
            baseline_ttl: Duration::from_secs(self.baseline_ttl_secs),
        }
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        ReporterConfig::Log
    }
}

impl ReporterConfig {
    pub fn build(&self) -> Result<Box<dyn Reporter>> {
        Ok(match self {
            ReporterConfig::Log => Box::new(LogReporter),
            ReporterConfig::Json { path: None } => Box::new(JsonReporter::stdout()),
            ReporterConfig::Json { path: Some(path) } => {
                let file = File::create(path).with_context(|| format!("unable to create {path:?}"))?;
                Box::new(JsonReporter::new(std::io::BufWriter::new(file)))
            }
            ReporterConfig::Statsd { host, port, prefix } => {
                Box::new(StatsdReporter::new(format!("{host}:{port}"), prefix.as_str())?)
            }
        })
    }
}

impl Default for PerfstatConfig {
    fn default() -> Self {
        Self {
            bpf_object: default_bpf_object(),
            collector: CollectorConfig::default(),
            probes: default_probes(),
            reporter: ReporterConfig::default(),
        }
    }
}

impl PerfstatConfig {
    /// `Perfstat.toml` in the current dir, or the defaults if there is none
    pub fn new() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG).exists() {
            Self::from_path(DEFAULT_CONFIG)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::new(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let current_dir = std::env::current_dir().context("unable to get current dir")?;
        let mut config_file = File::open(path)
            .with_context(move || format!("{path:?} not found in {current_dir:?}"))?;
        let mut contents = String::new();
        config_file
            .read_to_string(&mut contents)
            .with_context(|| format!("something went wrong reading {path:?}"))?;
        let config: PerfstatConfig =
            toml::from_str(&contents).with_context(|| format!("unable to parse {path:?}"))?;
        Ok(config)
    }

    /// Keep only the named probes. Names that aren't configured but are
    /// events get a probe with default settings.
    pub fn select_probes(&mut self, names: &[String]) -> Result<(), CollectorError> {
        if names.is_empty() {
            return Ok(());
        }
        let mut selected = vec![];
        for name in names {
            match self.probes.iter().find(|p| &p.name == name) {
                Some(p) => selected.push(p.clone()),
                None => {
                    let event = name.parse::<Event>().map_err(CollectorError::InvalidConfiguration)?;
                    selected.push(Probe::new(event));
                }
            }
        }
        self.probes = selected;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CollectorError> {
        let invalid = |msg: String| Err(CollectorError::InvalidConfiguration(msg));
        if self.collector.interval_ms == 0 {
            return invalid("collector.interval_ms must be greater than zero".into());
        }
        if self.collector.baseline_ttl_secs == 0 {
            return invalid("collector.baseline_ttl_secs must be greater than zero".into());
        }
        if self.collector.store_capacity == 0 {
            return invalid("collector.store_capacity must be greater than zero".into());
        }
        if self.probes.is_empty() {
            return invalid("no probes configured".into());
        }
        let mut names = HashSet::new();
        for p in &self.probes {
            if p.sample_period == 0 {
                return invalid(format!("probe {}: sample_period must be greater than zero", p.name));
            }
            if !names.insert(p.name.as_str()) {
                return invalid(format!("duplicate probe name: {}", p.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::probes::Scope;

    #[test]
    fn test_defaults() {
        let config = PerfstatConfig::default();
        config.validate().unwrap();
        assert_eq!(config.collector.interval(), Duration::from_secs(1));
        assert_eq!(
            config.probes.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["instructions", "cache-misses"]
        );
        assert_eq!(config.reporter, ReporterConfig::Log);
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Perfstat.toml");
        let mut f = File::create(&path).unwrap();
        write!(
            f,
            r#"
bpf_object = "/opt/perfstat/probes.o"

[collector]
interval_ms = 250
min_pid = 300

[[probes]]
name = "instructions"
event = "instructions"
sample_period = 1000

[[probes]]
name = "db-misses"
event = "cache-misses"
scope = {{ type = "Pid", pid = 4242 }}

[reporter]
type = "Statsd"
port = 9125
"#
        )
        .unwrap();

        let config = PerfstatConfig::from_path(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.bpf_object, PathBuf::from("/opt/perfstat/probes.o"));
        assert_eq!(config.collector.interval(), Duration::from_millis(250));
        assert_eq!(config.collector.options().min_pid, 300);
        assert_eq!(config.collector.baseline_ttl_secs, 3600);
        assert_eq!(config.probes.len(), 2);
        assert_eq!(config.probes[0].sample_period, 1000);
        assert_eq!(config.probes[1].scope, Scope::Pid { pid: 4242 });
        assert_eq!(config.probes[1].map(), "MISS_COUNT");
        assert_eq!(
            config.reporter,
            ReporterConfig::Statsd {
                host: "127.0.0.1".into(),
                port: 9125,
                prefix: "perfstat".into()
            }
        );
    }

    #[test]
    fn test_missing_file() {
        let err = PerfstatConfig::from_path("/nonexistent/Perfstat.toml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_validate() {
        let mut config = PerfstatConfig::default();
        config.collector.interval_ms = 0;
        assert!(matches!(config.validate(), Err(CollectorError::InvalidConfiguration(_))));

        let mut config = PerfstatConfig::default();
        config.probes.clear();
        assert!(config.validate().is_err());

        let mut config = PerfstatConfig::default();
        config.probes.push(Probe::new(Event::Instructions));
        assert!(config.validate().unwrap_err().to_string().contains("duplicate probe name"));

        let mut config = PerfstatConfig::default();
        config.probes[0].sample_period = 0;
        assert!(config.validate().is_err());

        let mut config = PerfstatConfig::default();
        config.collector.baseline_ttl_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("baseline_ttl_secs"));
    }

    #[test]
    fn test_min_pid_never_zero() {
        let config = CollectorConfig {
            min_pid: 0,
            ..Default::default()
        };
        assert_eq!(config.options().min_pid, 1);
    }

    #[test]
    fn test_select_probes() {
        let mut config = PerfstatConfig::default();
        config
            .select_probes(&["cache-misses".to_string(), "branch-misses".to_string()])
            .unwrap();
        assert_eq!(
            config.probes.iter().map(|p| p.event).collect::<Vec<_>>(),
            vec![Event::CacheMisses, Event::BranchMisses]
        );

        assert!(config.select_probes(&["nope".to_string()]).is_err());
    }
}
