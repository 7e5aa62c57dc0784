//! Producer-facing Count/Measure/Time operations.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use multilog::log_warning;
use multilog::LogRouter;

use crate::event::MetricEvent;
use crate::queue::EventQueue;

#[derive(Debug, Default)]
struct Settings {
    key: String,
    prefix: String,
}

struct ClientInner {
    settings: Mutex<Settings>,
    counts: Arc<dyn EventQueue>,
    measures: Arc<dyn EventQueue>,
    router: Arc<LogRouter>,
}

/// Handle for reporting metrics. Cheap to clone; clones share settings and
/// queues.
///
/// No operation blocks or fails visibly: without an API key every call is a
/// no-op, and events rejected by a full queue are reported to the router at
/// WARNING.
#[derive(Clone)]
pub struct TelemetryClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let settings = self.settings();
        f.debug_struct("TelemetryClient")
            .field("enabled", &!settings.key.is_empty())
            .field("prefix", &settings.prefix)
            .finish()
    }
}

impl TelemetryClient {
    /// Build a client over caller-provided queues.
    pub fn with_queues(
        key: impl Into<String>,
        prefix: &str,
        counts: Arc<dyn EventQueue>,
        measures: Arc<dyn EventQueue>,
        router: Arc<LogRouter>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                settings: Mutex::new(Settings {
                    key: key.into(),
                    prefix: prefix.trim().to_string(),
                }),
                counts,
                measures,
                router,
            }),
        }
    }

    /// Add `n` to the counter `name`.
    pub fn count(&self, name: &str, n: i64) {
        let Some((name, key)) = self.resolve(name) else {
            return;
        };
        if let Err(rejected) = self.inner.counts.try_push(MetricEvent::count(name, key, n)) {
            log_warning!(self.inner.router, "dropped count for {}", rejected.name());
        }
    }

    /// Report an instantaneous `value` for `name`.
    pub fn measure(&self, name: &str, value: f64) {
        let Some((name, key)) = self.resolve(name) else {
            return;
        };
        if let Err(rejected) = self
            .inner
            .measures
            .try_push(MetricEvent::measure(name, key, value))
        {
            log_warning!(self.inner.router, "dropped measure for {}", rejected.name());
        }
    }

    /// Measure the time elapsed since `start`, in whole units of `precision`.
    pub fn time(&self, name: &str, start: Instant, precision: Duration) {
        if !self.is_enabled() {
            return;
        }
        let Some(units) = start.elapsed().as_nanos().checked_div(precision.as_nanos()) else {
            log_warning!(self.inner.router, "zero precision for timing {name}");
            return;
        };
        self.measure(name, units as f64);
    }

    /// Returns a guard that reports its lifetime through [`TelemetryClient::time`]
    /// when dropped.
    pub fn timer(&self, name: impl Into<String>, precision: Duration) -> TimerGuard {
        TimerGuard {
            client: self.clone(),
            name: name.into(),
            start: Instant::now(),
            precision,
        }
    }

    pub fn set_api_key(&self, key: impl Into<String>) {
        self.lock().key = key.into();
    }

    /// Set the name prefix; surrounding whitespace is trimmed.
    pub fn set_prefix(&self, prefix: &str) {
        self.lock().prefix = prefix.trim().to_string();
    }

    pub fn api_key(&self) -> String {
        self.lock().key.clone()
    }

    pub fn prefix(&self) -> String {
        self.lock().prefix.clone()
    }

    pub fn is_enabled(&self) -> bool {
        !self.lock().key.is_empty()
    }

    pub fn router(&self) -> &Arc<LogRouter> {
        &self.inner.router
    }

    /// Copies out the effective name and key; `None` when shipping is disabled.
    fn resolve(&self, name: &str) -> Option<(String, String)> {
        let settings = self.lock();
        if settings.key.is_empty() {
            return None;
        }
        let name = if settings.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", settings.prefix, name)
        };
        Some((name, settings.key.clone()))
    }

    fn settings(&self) -> Settings {
        let settings = self.lock();
        Settings {
            key: settings.key.clone(),
            prefix: settings.prefix.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        self.inner.settings.lock().expect("should not be poisoned")
    }
}

/// Reports the time between its creation and its drop as a measure.
#[must_use = "the timing is reported when the guard is dropped"]
pub struct TimerGuard {
    client: TelemetryClient,
    name: String,
    start: Instant,
    precision: Duration,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.client.time(&self.name, self.start, self.precision);
    }
}
