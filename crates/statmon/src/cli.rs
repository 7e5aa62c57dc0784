use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use multilog::Level;
use stathat::PipelineConfig;
use stathat::ShutdownPolicy;

#[derive(Parser, Debug)]
#[command(about, long_about, version)]
pub struct Cli {
    #[arg(long, env = "SH_KEY", help = "StatHat EZ key; metrics are discarded without one")]
    pub api_key: Option<String>,

    #[arg(
        long,
        env = "STATMON_PREFIX",
        help = "Prefix prepended to every metric name, e.g. [api]"
    )]
    pub prefix: Option<String>,

    #[arg(
        long,
        env = "STATMON_RUNTIME_INTERVAL",
        help = "Seconds between runtime samples, 0 disables sampling [default: 120]"
    )]
    pub runtime_interval: Option<u64>,

    #[arg(long, help = "Capacity of the count queue")]
    pub count_capacity: Option<usize>,

    #[arg(long, help = "Capacity of the measure queue")]
    pub measure_capacity: Option<usize>,

    #[arg(
        long,
        help = "Drop queued metrics on shutdown instead of shipping them",
        default_value_t = false
    )]
    pub discard_on_shutdown: bool,

    #[arg(long, help = "Seconds to wait for the shippers on shutdown")]
    pub shutdown_timeout: Option<u64>,

    #[arg(
        long,
        env = "STATHAT_ENDPOINT",
        help = "StatHat EZ API url override"
    )]
    pub endpoint: Option<String>,

    #[arg(
        long,
        env = "STATPIPE_LOG_PATH",
        value_hint = clap::ValueHint::FilePath,
        help = "Log file (rotated daily); logs go to stderr when unset"
    )]
    pub log_path: Option<PathBuf>,

    #[arg(
        long,
        default_value = "INFO",
        help = "Minimum level of pipeline messages: DEBUG, INFO, WARNING or ERROR"
    )]
    pub log_level: Level,

    #[arg(
        long,
        value_hint = clap::ValueHint::FilePath,
        help = "JSON pipeline config; flags override its values"
    )]
    pub config: Option<PathBuf>,
}

pub const DEFAULT_RUNTIME_INTERVAL_SECS: u64 = 120;

impl Cli {
    /// Config file values overlaid with whatever was given on the command line.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("read config file {} failed", path.display()))?;
                PipelineConfig::from_json(&json)
                    .with_context(|| format!("parse config file {} failed", path.display()))?
            }
            None => PipelineConfig::default(),
        };

        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.trim().to_string();
        }
        if let Some(capacity) = self.count_capacity {
            config.count_capacity = capacity;
        }
        if let Some(capacity) = self.measure_capacity {
            config.measure_capacity = capacity;
        }
        if self.discard_on_shutdown {
            config.shutdown = ShutdownPolicy::Discard;
        }
        if let Some(secs) = self.shutdown_timeout {
            config.shutdown_timeout_ms = secs.saturating_mul(1_000);
        }

        let interval = self
            .runtime_interval
            .or(config.runtime_interval_secs)
            .unwrap_or(DEFAULT_RUNTIME_INTERVAL_SECS);
        config.runtime_interval_secs = (interval > 0).then_some(interval);

        Ok(config)
    }
}
