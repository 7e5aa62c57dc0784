use thiserror::Error;

use crate::event::MetricKind;

/// Failure reported by a [`crate::MetricsSink`] for a single event.
#[derive(Debug, Error)]
pub enum ShipError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("the metrics pipeline must be spawned from within a tokio runtime")]
    NoRuntime,

    #[error("{queue} queue capacity must be greater than zero")]
    ZeroCapacity { queue: MetricKind },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("invalid pipeline config: {0}")]
    Config(#[from] serde_json::Error),
}
