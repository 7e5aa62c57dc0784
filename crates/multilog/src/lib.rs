//! Severity-filtered logging fan-out.
//!
//! A [`LogRouter`] holds an insertion-ordered list of [`LogSink`]s and hands
//! every record to each sink whose minimum [`Level`] is at or below the
//! record's level. Records reach sinks as a single string prefixed with
//! `"[LEVEL] "`.
//!
//! ```
//! use std::sync::Arc;
//!
//! use multilog::{log_warning, Level, LogRouter, MemorySink};
//!
//! let memory = Arc::new(MemorySink::with_level(Level::Warning));
//! let router = LogRouter::new();
//! router.add(memory.clone());
//!
//! log_warning!(router, "dropped count for {}", "users");
//! multilog::log_info!(router, "not delivered");
//!
//! assert_eq!(memory.messages(), vec!["[WARNING] dropped count for users"]);
//! ```

mod async_sink;
mod level;
mod macros;
mod memory;
mod router;
mod sink;

pub use async_sink::AsyncSink;
pub use level::Level;
pub use level::ParseLevelError;
pub use memory::MemorySink;
pub use router::panic_message;
pub use router::LogRouter;
pub use sink::LogSink;
pub use sink::TracingSink;
pub use sink::WriterSink;
