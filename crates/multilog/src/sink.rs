//! Sink contract and the bundled writer/tracing sinks.

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use crate::Level;

/// A log destination gated by a minimum level.
///
/// `write` receives the fully formatted record, already prefixed with
/// `"[LEVEL] "`.
pub trait LogSink: Send + Sync {
    fn write(&self, message: &str);

    fn level(&self) -> Level;
}

impl<T> LogSink for Arc<T>
where
    T: LogSink + ?Sized,
{
    fn write(&self, message: &str) {
        (**self).write(message);
    }

    fn level(&self) -> Level {
        (**self).level()
    }
}

impl<T> LogSink for Box<T>
where
    T: LogSink + ?Sized,
{
    fn write(&self, message: &str) {
        (**self).write(message);
    }

    fn level(&self) -> Level {
        (**self).level()
    }
}

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S ";

/// Writes one line per record to an [`std::io::Write`], prefixed with the
/// local date and time.
pub struct WriterSink<W> {
    writer: Mutex<W>,
    level: Level,
    timestamps: bool,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W, level: Level) -> Self {
        Self {
            writer: Mutex::new(writer),
            level,
            timestamps: true,
        }
    }

    /// Drop the date/time prefix.
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().expect("should not be poisoned")
    }
}

impl WriterSink<std::io::Stderr> {
    pub fn stderr(level: Level) -> Self {
        Self::new(std::io::stderr(), level)
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write(&self, message: &str) {
        let mut line = String::with_capacity(message.len() + 21);
        if self.timestamps {
            line.push_str(&chrono::Local::now().format(TIMESTAMP_FORMAT).to_string());
        }
        line.push_str(message);
        if !line.ends_with('\n') {
            line.push('\n');
        }

        let mut writer = self.writer.lock().expect("should not be poisoned");
        // the router owning this sink is the only place to report to
        let _ = writer.write_all(line.as_bytes());
    }

    fn level(&self) -> Level {
        self.level
    }
}

/// Forwards records to the global `tracing` dispatcher under the
/// `multilog` target.
///
/// The tracing level comes from the record's [`Level::record`] tag; records
/// without one are emitted at the sink's own level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    level: Level,
}

impl TracingSink {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl LogSink for TracingSink {
    fn write(&self, message: &str) {
        let message = message.trim_end();
        match Level::of_record(message).unwrap_or(self.level) {
            Level::Error => tracing::error!(target: "multilog", "{message}"),
            Level::Warning => tracing::warn!(target: "multilog", "{message}"),
            Level::Info => tracing::info!(target: "multilog", "{message}"),
            Level::Debug => tracing::debug!(target: "multilog", "{message}"),
        }
    }

    fn level(&self) -> Level {
        self.level
    }
}
