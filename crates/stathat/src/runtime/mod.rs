//! Periodic sampling of process runtime health.

mod alloc;

use std::time::Duration;

use multilog::log_debug;
use multilog::log_warning;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub use alloc::heap_snapshot;
pub use alloc::HeapSnapshot;
pub use alloc::TrackingAllocator;

use crate::client::TelemetryClient;

pub const RUNTIME_PREFIX: &str = "[runtime]";

/// Divisor applied to the byte figures, kept as `2 << 20` so existing
/// dashboards keep their scale.
pub const MB: f64 = (2u64 << 20) as f64;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// One reading of the process runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuntimeStats {
    /// alive tasks on the tokio runtime
    pub tasks: usize,
    /// most recent scheduler stall observed by the sampler
    pub last_pause: Duration,
    pub allocated_bytes: u64,
    pub heap_allocated_bytes: u64,
    /// live heap allocations
    pub heap_objects: u64,
}

pub trait RuntimeStatsSource: Send {
    /// `pause` is how late the sampler woke up for this tick.
    fn sample(&mut self, pause: Duration) -> RuntimeStats;
}

/// Reads the current tokio runtime and the [`TrackingAllocator`] counters.
#[derive(Debug, Default)]
pub struct ProcessStats;

impl RuntimeStatsSource for ProcessStats {
    fn sample(&mut self, pause: Duration) -> RuntimeStats {
        let tasks = tokio::runtime::Handle::try_current()
            .map(|handle| handle.metrics().num_alive_tasks())
            .unwrap_or(0);
        let heap = heap_snapshot();

        RuntimeStats {
            tasks,
            last_pause: pause,
            allocated_bytes: heap.bytes,
            heap_allocated_bytes: heap.bytes,
            heap_objects: heap.objects,
        }
    }
}

/// Feeds runtime readings into a [`TelemetryClient`] on a fixed period.
pub struct RuntimeSampler {
    client: TelemetryClient,
    source: Box<dyn RuntimeStatsSource>,
}

impl RuntimeSampler {
    pub fn new(client: TelemetryClient) -> Self {
        Self::with_source(client, ProcessStats)
    }

    pub fn with_source<S>(client: TelemetryClient, source: S) -> Self
    where
        S: RuntimeStatsSource + 'static,
    {
        Self {
            client,
            source: Box::new(source),
        }
    }

    /// Sample every `interval` until `token` is cancelled. The first sample
    /// is taken one interval after start.
    pub async fn run(mut self, interval: Duration, token: CancellationToken) {
        let router = self.client.router().clone();
        if interval.is_zero() {
            log_warning!(router, "runtime sampler not started: zero interval");
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        log_debug!(router, "runtime sampler started with interval {interval:?}");
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                scheduled = ticker.tick() => {
                    let pause = Instant::now().saturating_duration_since(scheduled);
                    let stats = self.source.sample(pause);
                    self.report(&stats);
                }
            }
        }
        log_debug!(router, "runtime sampler stopped");
    }

    pub fn report(&self, stats: &RuntimeStats) {
        let measure = |name: &str, value: f64| {
            self.client.measure(&format!("{RUNTIME_PREFIX} {name}"), value);
        };

        measure("goroutines", stats.tasks as f64);
        measure(
            "gcpausetime",
            stats.last_pause.as_nanos() as f64 / NANOS_PER_MILLI,
        );
        measure("alloc", stats.allocated_bytes as f64 / MB);
        measure("heapalloc", stats.heap_allocated_bytes as f64 / MB);
        // object count over the byte divisor, as dashboards expect
        measure("heapobj", stats.heap_objects as f64 / MB);
    }
}
