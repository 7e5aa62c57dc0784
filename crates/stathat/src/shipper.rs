//! Background workers draining one queue each into a [`MetricsSink`].

use std::ops::AddAssign;
use std::sync::Arc;

use multilog::log_debug;
use multilog::log_info;
use multilog::log_warning;
use multilog::LogRouter;
use tokio_util::sync::CancellationToken;

use crate::config::ShutdownPolicy;
use crate::event::MetricEvent;
use crate::event::MetricKind;
use crate::queue::QueueReceiver;
use crate::sink::MetricsSink;

/// What a shipper did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShipperStats {
    pub shipped: u64,
    pub failed: u64,
    pub discarded: u64,
}

impl AddAssign for ShipperStats {
    fn add_assign(&mut self, rhs: Self) {
        self.shipped += rhs.shipped;
        self.failed += rhs.failed;
        self.discarded += rhs.discarded;
    }
}

pub struct Shipper {
    kind: MetricKind,
    rx: QueueReceiver,
    sink: Arc<dyn MetricsSink>,
    router: Arc<LogRouter>,
    policy: ShutdownPolicy,
    stats: ShipperStats,
}

impl Shipper {
    pub fn new(
        kind: MetricKind,
        rx: QueueReceiver,
        sink: Arc<dyn MetricsSink>,
        router: Arc<LogRouter>,
        policy: ShutdownPolicy,
    ) -> Self {
        Self {
            kind,
            rx,
            sink,
            router,
            policy,
            stats: ShipperStats::default(),
        }
    }

    /// Ship events in queue order until the token is cancelled or every
    /// producer is gone.
    ///
    /// A failed shipment is logged at WARNING and the event is discarded.
    pub async fn run(mut self, token: CancellationToken) -> ShipperStats {
        log_debug!(self.router, "{} shipper started", self.kind);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.finish().await;
                    break;
                }
                event = self.rx.recv() => match event {
                    Some(event) => self.ship(event).await,
                    None => break,
                },
            }
        }

        log_debug!(
            self.router,
            "{} shipper stopped: shipped={} failed={} discarded={}",
            self.kind,
            self.stats.shipped,
            self.stats.failed,
            self.stats.discarded
        );
        self.stats
    }

    async fn ship(&mut self, event: MetricEvent) {
        let result = match &event {
            MetricEvent::Count(c) => self.sink.post_count(&c.name, &c.key, c.n).await,
            MetricEvent::Measure(m) => self.sink.post_value(&m.name, &m.key, m.value).await,
        };

        match result {
            Ok(()) => self.stats.shipped += 1,
            Err(err) => {
                self.stats.failed += 1;
                log_warning!(
                    self.router,
                    "failed to ship {} {}: {err}",
                    event.kind(),
                    event.name()
                );
            }
        }
    }

    async fn finish(&mut self) {
        // producers see the queue as closed from here on
        self.rx.close();

        match self.policy {
            ShutdownPolicy::Drain => {
                while let Some(event) = self.rx.recv().await {
                    self.ship(event).await;
                }
            }
            ShutdownPolicy::Discard => {
                while self.rx.recv().await.is_some() {
                    self.stats.discarded += 1;
                }
                if self.stats.discarded > 0 {
                    log_info!(
                        self.router,
                        "discarded {} queued {} events",
                        self.stats.discarded,
                        self.kind
                    );
                }
            }
        }
    }
}
