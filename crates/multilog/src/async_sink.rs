use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Level;
use crate::LogSink;

/// Decouples a slow sink from the router.
///
/// `write` hands the message to a bounded queue and returns at once; a
/// dedicated task feeds the wrapped sink. When the queue is full the message
/// is dropped and counted in [`AsyncSink::dropped`].
pub struct AsyncSink {
    tx: mpsc::Sender<String>,
    level: Level,
    dropped: Arc<AtomicU64>,
}

impl AsyncSink {
    /// Spawn the feeding task on the current tokio runtime.
    ///
    /// The task stops once `token` is cancelled, after writing out the
    /// messages already queued, or once every handle to the sink is gone.
    pub fn spawn<S>(inner: S, capacity: usize, token: CancellationToken) -> (Self, JoinHandle<()>)
    where
        S: LogSink + 'static,
    {
        let level = inner.level();
        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        rx.close();
                        while let Some(message) = rx.recv().await {
                            inner.write(&message);
                        }
                        break;
                    }
                    message = rx.recv() => match message {
                        Some(message) => inner.write(&message),
                        None => break,
                    },
                }
            }
        });

        let sink = Self {
            tx,
            level,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, handle)
    }

    /// Number of messages discarded because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl LogSink for AsyncSink {
    fn write(&self, message: &str) {
        if self.tx.try_send(message.to_string()).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn level(&self) -> Level {
        self.level
    }
}
