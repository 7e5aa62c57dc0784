//! Outbound shipment of metric events.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::PipelineError;
use crate::error::ShipError;

/// StatHat's EZ API endpoint.
pub const DEFAULT_EZ_ENDPOINT: &str = "https://api.stathat.com/ez";

/// Destination for shipped events.
///
/// Each call ships exactly one event; a returned error is logged by the
/// shipper and the event is discarded.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn post_count(&self, name: &str, key: &str, n: i64) -> Result<(), ShipError>;

    async fn post_value(&self, name: &str, key: &str, value: f64) -> Result<(), ShipError>;
}

#[async_trait]
impl<T> MetricsSink for Arc<T>
where
    T: MetricsSink + ?Sized,
{
    async fn post_count(&self, name: &str, key: &str, n: i64) -> Result<(), ShipError> {
        (**self).post_count(name, key, n).await
    }

    async fn post_value(&self, name: &str, key: &str, value: f64) -> Result<(), ShipError> {
        (**self).post_value(name, key, value).await
    }
}

/// StatHat sink config.
#[derive(Debug, Clone)]
pub struct StatHatConfig {
    /// EZ API url
    pub endpoint: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for StatHatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_EZ_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl StatHatConfig {
    /// set EZ API url.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Posts events to the StatHat EZ API as form-encoded requests.
#[derive(Debug, Clone)]
pub struct StatHatSink {
    http: reqwest::Client,
    endpoint: String,
}

impl StatHatSink {
    pub fn new(config: StatHatConfig) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(PipelineError::HttpClient)?;

        tracing::debug!(endpoint = %config.endpoint, "StatHat sink created");

        Ok(Self {
            http,
            endpoint: config.endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, form: &[(&str, &str)]) -> Result<(), ShipError> {
        let response = self.http.post(&self.endpoint).form(form).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ShipError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MetricsSink for StatHatSink {
    async fn post_count(&self, name: &str, key: &str, n: i64) -> Result<(), ShipError> {
        let count = n.to_string();
        tracing::trace!(stat = name, count = n, "posting count");
        self.post(&[("ezkey", key), ("stat", name), ("count", &count)])
            .await
    }

    async fn post_value(&self, name: &str, key: &str, value: f64) -> Result<(), ShipError> {
        let value_str = value.to_string();
        tracing::trace!(stat = name, value, "posting value");
        self.post(&[("ezkey", key), ("stat", name), ("value", &value_str)])
            .await
    }
}

/// One call observed by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Shipped {
    Count { name: String, key: String, n: i64 },
    Value { name: String, key: String, value: f64 },
}

impl Shipped {
    pub fn name(&self) -> &str {
        match self {
            Shipped::Count { name, .. } | Shipped::Value { name, .. } => name,
        }
    }
}

/// In-memory sink recording every call, optionally failing them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<Shipped>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    notify: Notify,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `message` (still recorded).
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().expect("should not be poisoned") = Some(message.into());
    }

    /// Sleep for `delay` inside every following call.
    pub fn slow_down(&self, delay: Duration) {
        *self.delay.lock().expect("should not be poisoned") = Some(delay);
    }

    pub fn calls(&self) -> Vec<Shipped> {
        self.calls.lock().expect("should not be poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().expect("should not be poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `n` calls have been recorded.
    pub async fn wait_for(&self, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.len() >= n {
                return;
            }
            notified.await;
        }
    }

    async fn record(&self, call: Shipped) -> Result<(), ShipError> {
        let delay = *self.delay.lock().expect("should not be poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().expect("should not be poisoned").push(call);
        self.notify.notify_waiters();

        match self.failure.lock().expect("should not be poisoned").clone() {
            Some(message) => Err(ShipError::Other(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn post_count(&self, name: &str, key: &str, n: i64) -> Result<(), ShipError> {
        self.record(Shipped::Count {
            name: name.to_string(),
            key: key.to_string(),
            n,
        })
        .await
    }

    async fn post_value(&self, name: &str, key: &str, value: f64) -> Result<(), ShipError> {
        self.record(Shipped::Value {
            name: name.to_string(),
            key: key.to_string(),
            value,
        })
        .await
    }
}
