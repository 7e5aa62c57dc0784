//! Bounded, drop-on-full dispatch queues.

use std::num::NonZeroUsize;

use tokio::sync::mpsc;

use crate::event::MetricEvent;

pub const DEFAULT_COUNT_CAPACITY: usize = 10_000;
pub const DEFAULT_MEASURE_CAPACITY: usize = 20_000;

/// Producer side of a dispatch queue.
///
/// `try_push` never blocks. `Err` means the event was not accepted (the
/// queue is full or its consumer is gone) and hands it back to the caller.
pub trait EventQueue: Send + Sync {
    fn try_push(&self, event: MetricEvent) -> Result<(), MetricEvent>;

    fn capacity(&self) -> usize;
}

/// FIFO queue with a capacity fixed at construction.
///
/// Newly arriving events are rejected once the queue is full; events already
/// queued are never displaced.
#[derive(Debug, Clone)]
pub struct BoundedQueue {
    tx: mpsc::Sender<MetricEvent>,
}

pub type QueueReceiver = mpsc::Receiver<MetricEvent>;

impl BoundedQueue {
    pub fn new(capacity: NonZeroUsize) -> (Self, QueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity.get());
        (Self { tx }, rx)
    }

    /// Number of events currently waiting for the consumer.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventQueue for BoundedQueue {
    fn try_push(&self, event: MetricEvent) -> Result<(), MetricEvent> {
        self.tx.try_send(event).map_err(|err| err.into_inner())
    }

    fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn queue(capacity: usize) -> (BoundedQueue, QueueReceiver) {
        BoundedQueue::new(NonZeroUsize::new(capacity).expect("non-zero"))
    }

    #[test]
    fn rejects_new_arrivals_when_full() {
        let (queue, mut rx) = queue(2);
        assert_eq!(queue.capacity(), 2);

        assert!(queue.try_push(MetricEvent::count("a", "k", 1)).is_ok());
        assert!(queue.try_push(MetricEvent::count("b", "k", 1)).is_ok());
        assert_eq!(queue.len(), 2);

        let rejected = queue
            .try_push(MetricEvent::count("c", "k", 1))
            .expect_err("queue is full");
        assert_eq!(rejected.name(), "c");

        // the oldest events survive
        assert_eq!(rx.try_recv().expect("first").name(), "a");
        assert_eq!(rx.try_recv().expect("second").name(), "b");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn accepts_again_after_drain() {
        let (queue, mut rx) = queue(1);
        assert!(queue.try_push(MetricEvent::measure("a", "k", 1.0)).is_ok());
        assert!(queue.try_push(MetricEvent::measure("b", "k", 1.0)).is_err());

        rx.try_recv().expect("queued");
        assert!(queue.is_empty());
        assert!(queue.try_push(MetricEvent::measure("c", "k", 1.0)).is_ok());
    }

    #[test]
    fn rejects_once_consumer_is_gone() {
        let (queue, rx) = queue(4);
        drop(rx);
        assert!(queue.is_closed());
        assert!(queue.try_push(MetricEvent::count("a", "k", 1)).is_err());
    }

    #[test]
    fn preserves_fifo_order() {
        let (queue, mut rx) = queue(8);
        for i in 0..8 {
            queue
                .try_push(MetricEvent::count(format!("m{i}"), "k", i))
                .expect("room");
        }
        let names: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, (0..8).map(|i| format!("m{i}")).collect::<Vec<_>>());
    }
}
