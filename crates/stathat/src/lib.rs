//! Fire-and-forget metric reporting to StatHat.
//!
//! Producers call [`TelemetryClient::count`] and [`TelemetryClient::measure`],
//! which never block: events go into bounded per-kind queues and are dropped
//! (with a WARNING on the client's [`multilog::LogRouter`]) when a queue is
//! full. One background [`Shipper`] per queue forwards events to a
//! [`MetricsSink`], normally the StatHat EZ API.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use multilog::{Level, LogRouter, TracingSink};
//! use stathat::{Pipeline, StatHatConfig, StatHatSink};
//!
//! # async fn run() -> Result<(), stathat::PipelineError> {
//! let router = Arc::new(LogRouter::new());
//! router.add(TracingSink::new(Level::Info));
//!
//! let sink = Arc::new(StatHatSink::new(StatHatConfig::default())?);
//! let pipeline = Pipeline::builder()
//!     .with_prefix("[api]")
//!     .with_runtime_interval(Duration::from_secs(120))
//!     .spawn(sink, router)?;
//!
//! pipeline.client().count("requests", 1);
//! pipeline.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod event;
mod pipeline;
mod queue;
pub mod runtime;
mod shipper;
mod sink;

pub use client::TelemetryClient;
pub use client::TimerGuard;
pub use config::PipelineConfig;
pub use config::ShutdownPolicy;
pub use error::PipelineError;
pub use error::ShipError;
pub use event::CountEvent;
pub use event::MeasureEvent;
pub use event::MetricEvent;
pub use event::MetricKind;
pub use pipeline::resolve_api_key;
pub use pipeline::Pipeline;
pub use pipeline::PipelineBuilder;
pub use pipeline::PipelineReport;
pub use pipeline::API_KEY_ENV_VAR;
pub use queue::BoundedQueue;
pub use queue::EventQueue;
pub use queue::QueueReceiver;
pub use queue::DEFAULT_COUNT_CAPACITY;
pub use queue::DEFAULT_MEASURE_CAPACITY;
pub use runtime::RuntimeSampler;
pub use runtime::TrackingAllocator;
pub use shipper::Shipper;
pub use shipper::ShipperStats;
pub use sink::MetricsSink;
pub use sink::RecordingSink;
pub use sink::Shipped;
pub use sink::StatHatConfig;
pub use sink::StatHatSink;
pub use sink::DEFAULT_EZ_ENDPOINT;
