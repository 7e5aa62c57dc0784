//! Construction and lifecycle of the client, its shippers and the sampler.

use std::env;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use multilog::log_error;
use multilog::log_info;
use multilog::log_warning;
use multilog::LogRouter;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::sync::DropGuard;

use crate::client::TelemetryClient;
use crate::config::PipelineConfig;
use crate::config::ShutdownPolicy;
use crate::error::PipelineError;
use crate::event::MetricKind;
use crate::queue::BoundedQueue;
use crate::runtime::RuntimeSampler;
use crate::runtime::RuntimeStatsSource;
use crate::shipper::Shipper;
use crate::shipper::ShipperStats;
use crate::sink::MetricsSink;

/// Environment variable consulted for the API key when none is configured.
pub const API_KEY_ENV_VAR: &str = "SH_KEY";

/// An explicitly configured non-empty key wins; otherwise `lookup` is asked
/// for [`API_KEY_ENV_VAR`] once. A missing variable leaves the key empty.
pub fn resolve_api_key<F>(explicit: Option<&str>, lookup: F) -> String
where
    F: FnOnce(&str) -> Option<String>,
{
    match explicit {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => lookup(API_KEY_ENV_VAR).unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    runtime_interval: Option<Duration>,
    shutdown_timeout: Option<Duration>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every setting with `config`.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self.runtime_interval = None;
        self.shutdown_timeout = None;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Prefix prepended to every metric name; whitespace is trimmed.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.config.prefix = prefix.trim().to_string();
        self
    }

    pub fn with_count_capacity(mut self, capacity: usize) -> Self {
        self.config.count_capacity = capacity;
        self
    }

    pub fn with_measure_capacity(mut self, capacity: usize) -> Self {
        self.config.measure_capacity = capacity;
        self
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.config.shutdown = policy;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Start the runtime sampler together with the shippers.
    pub fn with_runtime_interval(mut self, interval: Duration) -> Self {
        self.runtime_interval = Some(interval);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sampling period the pipeline will start with, if any.
    pub fn runtime_interval(&self) -> Option<Duration> {
        self.runtime_interval.or_else(|| self.config.runtime_interval())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
            .unwrap_or_else(|| self.config.shutdown_timeout())
    }

    /// Spawn the shippers on the current tokio runtime, reading `SH_KEY`
    /// when no key was configured.
    pub fn spawn(
        self,
        sink: Arc<dyn MetricsSink>,
        router: Arc<LogRouter>,
    ) -> Result<Pipeline, PipelineError> {
        self.spawn_with_env(sink, router, |name| env::var(name).ok())
    }

    /// Like [`PipelineBuilder::spawn`] with a custom environment lookup.
    pub fn spawn_with_env<F>(
        self,
        sink: Arc<dyn MetricsSink>,
        router: Arc<LogRouter>,
        lookup: F,
    ) -> Result<Pipeline, PipelineError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let handle = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;
        let runtime_interval = self.runtime_interval();
        let shutdown_timeout = self.shutdown_timeout();
        let config = self.config;

        let count_capacity =
            NonZeroUsize::new(config.count_capacity).ok_or(PipelineError::ZeroCapacity {
                queue: MetricKind::Count,
            })?;
        let measure_capacity =
            NonZeroUsize::new(config.measure_capacity).ok_or(PipelineError::ZeroCapacity {
                queue: MetricKind::Measure,
            })?;

        let key = resolve_api_key(config.api_key.as_deref(), lookup);
        let (counts, count_rx) = BoundedQueue::new(count_capacity);
        let (measures, measure_rx) = BoundedQueue::new(measure_capacity);
        let client = TelemetryClient::with_queues(
            key,
            &config.prefix,
            Arc::new(counts),
            Arc::new(measures),
            router.clone(),
        );

        let token = CancellationToken::new();
        let count_shipper = handle.spawn(
            Shipper::new(
                MetricKind::Count,
                count_rx,
                sink.clone(),
                router.clone(),
                config.shutdown,
            )
            .run(token.clone()),
        );
        let measure_shipper = handle.spawn(
            Shipper::new(
                MetricKind::Measure,
                measure_rx,
                sink,
                router.clone(),
                config.shutdown,
            )
            .run(token.clone()),
        );

        let mut pipeline = Pipeline {
            client,
            router,
            handle,
            cancel_on_drop: token.clone().drop_guard(),
            token,
            count_shipper,
            measure_shipper,
            samplers: Vec::new(),
            shutdown_timeout,
        };
        if let Some(interval) = runtime_interval {
            pipeline.start_runtime_sampler(interval);
        }
        Ok(pipeline)
    }
}

/// Shipper totals gathered at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub counts: ShipperStats,
    pub measures: ShipperStats,
}

impl PipelineReport {
    pub fn total(&self) -> ShipperStats {
        let mut total = self.counts;
        total += self.measures;
        total
    }
}

/// A running pipeline: the client plus the background tasks feeding off it.
///
/// All tasks share one cancellation token; [`Pipeline::shutdown`] cancels it
/// and waits for them. Dropping the pipeline cancels it without waiting.
pub struct Pipeline {
    client: TelemetryClient,
    router: Arc<LogRouter>,
    handle: Handle,
    token: CancellationToken,
    cancel_on_drop: DropGuard,
    count_shipper: JoinHandle<ShipperStats>,
    measure_shipper: JoinHandle<ShipperStats>,
    samplers: Vec<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn client(&self) -> &TelemetryClient {
        &self.client
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Report runtime statistics every `interval` until shutdown.
    pub fn start_runtime_sampler(&mut self, interval: Duration) {
        let sampler = RuntimeSampler::new(self.client.clone());
        self.spawn_sampler(sampler, interval);
    }

    pub fn start_runtime_sampler_with<S>(&mut self, source: S, interval: Duration)
    where
        S: RuntimeStatsSource + 'static,
    {
        let sampler = RuntimeSampler::with_source(self.client.clone(), source);
        self.spawn_sampler(sampler, interval);
    }

    fn spawn_sampler(&mut self, sampler: RuntimeSampler, interval: Duration) {
        let token = self.token.clone();
        let task = self.handle.spawn(sampler.run(interval, token));
        self.samplers.push(task);
    }

    /// Cancel every task and wait for them within the configured timeout.
    ///
    /// Tasks still running at the deadline are aborted.
    pub async fn shutdown(self) -> PipelineReport {
        log_info!(self.router, "shutting down metrics pipeline");
        drop(self.cancel_on_drop);

        // a timeout too large to add to now means no deadline
        let deadline = tokio::time::Instant::now().checked_add(self.shutdown_timeout);
        for (index, sampler) in self.samplers.into_iter().enumerate() {
            join_by(deadline, sampler, &format!("runtime sampler {index}"), &self.router).await;
        }

        let counts = join_by(deadline, self.count_shipper, "count shipper", &self.router)
            .await
            .unwrap_or_default();
        let measures = join_by(deadline, self.measure_shipper, "measure shipper", &self.router)
            .await
            .unwrap_or_default();

        let report = PipelineReport { counts, measures };
        let total = report.total();
        log_info!(
            self.router,
            "metrics pipeline stopped: shipped={} failed={} discarded={}",
            total.shipped,
            total.failed,
            total.discarded
        );
        report
    }
}

async fn join_by<T>(
    deadline: Option<tokio::time::Instant>,
    mut task: JoinHandle<T>,
    name: &str,
    router: &LogRouter,
) -> Option<T> {
    let joined = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, &mut task).await,
        None => Ok((&mut task).await),
    };
    match joined {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            log_error!(router, "{name} failed during shutdown: {err}");
            None
        }
        Err(_) => {
            task.abort();
            log_warning!(router, "{name} did not stop before the shutdown timeout, aborted");
            None
        }
    }
}
