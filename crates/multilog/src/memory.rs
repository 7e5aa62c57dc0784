use std::sync::Mutex;

use crate::Level;
use crate::LogSink;

/// In-memory sink that records every message it receives.
///
/// Captures everything at [`Level::Debug`] and above unless changed with
/// [`MemorySink::set_level`]. Useful for asserting on what a component
/// logged.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<Recorded>,
}

#[derive(Debug, Default)]
struct Recorded {
    messages: Vec<String>,
    cursor: usize,
    level: Level,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: Level) -> Self {
        let sink = Self::default();
        sink.set_level(level);
        sink
    }

    pub fn set_level(&self, level: Level) {
        self.lock().level = level;
    }

    /// Forget every recorded message and rewind the cursor.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.messages.clear();
        inner.cursor = 0;
    }

    pub fn called(&self) -> bool {
        !self.lock().messages.is_empty()
    }

    pub fn called_n(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().messages.clone()
    }

    /// Whether any recorded message equals `message` exactly.
    pub fn called_with(&self, message: &str) -> bool {
        self.lock().messages.iter().any(|m| m == message)
    }

    pub fn last_called_with(&self, message: &str) -> bool {
        self.lock().messages.last().is_some_and(|m| m == message)
    }

    /// Compares the message under the cursor and advances it.
    ///
    /// Returns `None` once every recorded message has been visited.
    pub fn next_called_with(&self, message: &str) -> Option<bool> {
        let mut inner = self.lock();
        let next = inner.messages.get(inner.cursor).map(|m| m == message)?;
        inner.cursor += 1;
        Some(next)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.count_containing(needle) > 0
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lock()
            .messages
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().expect("should not be poisoned")
    }
}

impl LogSink for MemorySink {
    fn write(&self, message: &str) {
        self.lock().messages.push(message.to_string());
    }

    fn level(&self) -> Level {
        self.lock().level
    }
}
