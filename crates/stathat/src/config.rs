use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::PipelineError;
use crate::queue::DEFAULT_COUNT_CAPACITY;
use crate::queue::DEFAULT_MEASURE_CAPACITY;

/// What shippers do with events still queued when shutdown is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Ship what is already queued (bounded by the shutdown timeout).
    #[default]
    Drain,
    /// Drop what is queued and report how many were dropped.
    Discard,
}

/// Pipeline configuration, usually read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// StatHat EZ key; falls back to `SH_KEY` when absent or empty.
    pub api_key: Option<String>,
    pub prefix: String,
    pub count_capacity: usize,
    pub measure_capacity: usize,
    /// Runtime sampling period; no sampler runs when unset.
    pub runtime_interval_secs: Option<u64>,
    pub shutdown: ShutdownPolicy,
    pub shutdown_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            prefix: String::new(),
            count_capacity: DEFAULT_COUNT_CAPACITY,
            measure_capacity: DEFAULT_MEASURE_CAPACITY,
            runtime_interval_secs: None,
            shutdown: ShutdownPolicy::Drain,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn runtime_interval(&self) -> Option<Duration> {
        self.runtime_interval_secs.map(Duration::from_secs)
    }
}
