//! Fan-out of log records to every registered sink.

use core::any::Any;
use core::fmt;
use std::future::Future;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;

use futures::FutureExt as _;

use crate::Level;
use crate::LogSink;

/// Dispatches each record to every sink whose minimum level is at or below
/// the record's level.
///
/// Sinks are visited in registration order, synchronously, under a shared
/// read lock: a slow sink delays every sink registered after it. Wrap such a
/// sink in [`crate::AsyncSink`] to decouple it. A sink must not call
/// [`LogRouter::add`] on the router that is writing to it.
#[derive(Default)]
pub struct LogRouter {
    sinks: RwLock<Vec<Arc<dyn LogSink>>>,
}

impl fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRouter")
            .field("sinks", &self.sink_count())
            .finish()
    }
}

impl LogRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sinks<I>(sinks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn LogSink>>,
    {
        let router = Self::new();
        router.extend(sinks);
        router
    }

    /// Register a sink after every sink already present.
    pub fn add<S>(&self, sink: S)
    where
        S: LogSink + 'static,
    {
        self.write_lock().push(Arc::new(sink));
    }

    pub fn extend<I>(&self, sinks: I)
    where
        I: IntoIterator<Item = Arc<dyn LogSink>>,
    {
        self.write_lock().extend(sinks);
    }

    /// Remove every registered sink.
    pub fn reset(&self) {
        self.write_lock().clear();
    }

    pub fn sink_count(&self) -> usize {
        self.read_lock().len()
    }

    pub fn dispatch(&self, level: Level, args: fmt::Arguments<'_>) {
        let sinks = self.read_lock();
        if !sinks.iter().any(|sink| sink.level() <= level) {
            return;
        }

        let message = level.record(args);
        for sink in sinks.iter() {
            if sink.level() <= level {
                sink.write(&message);
            }
        }
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.dispatch(Level::Error, args);
    }

    pub fn warning(&self, args: fmt::Arguments<'_>) {
        self.dispatch(Level::Warning, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.dispatch(Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.dispatch(Level::Debug, args);
    }

    /// Runs `f`, reporting a panic at [`Level::Error`] before letting it
    /// continue to unwind with the original payload.
    pub fn capture_panic<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => value,
            Err(payload) => {
                self.error(format_args!("{}", panic_message(payload.as_ref())));
                panic::resume_unwind(payload)
            }
        }
    }

    /// Async counterpart of [`LogRouter::capture_panic`].
    pub async fn capture_panic_async<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(value) => value,
            Err(payload) => {
                self.error(format_args!("{}", panic_message(payload.as_ref())));
                panic::resume_unwind(payload)
            }
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn LogSink>>> {
        self.sinks.read().expect("should not be poisoned")
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn LogSink>>> {
        self.sinks.write().expect("should not be poisoned")
    }
}

/// Renders a panic payload the way the default hook does.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "Box<dyn Any>"
    }
}
