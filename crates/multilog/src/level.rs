use core::fmt;
use core::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Logging severity, ordered from least to most severe.
///
/// A sink configured at level `L` receives every record whose level is
/// `>= L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    #[default]
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Debug, Level::Info, Level::Warning, Level::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }

    /// Formats a router record, `"[LEVEL] message"`.
    pub fn record(self, args: fmt::Arguments<'_>) -> String {
        format!("[{self}] {args}")
    }

    /// Level tag of a record built by [`Level::record`], if any.
    pub fn of_record(message: &str) -> Option<Level> {
        let (tag, _) = message.strip_prefix('[')?.split_once(']')?;
        tag.parse().ok()
    }

    /// Lenient conversion: anything unrecognised becomes [`Level::Debug`].
    pub fn parse_lossy(s: &str) -> Level {
        s.parse().unwrap_or(Level::Debug)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown logging level `{0}`")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl From<Level> for tracing::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warning => tracing::Level::WARN,
            Level::Error => tracing::Level::ERROR,
        }
    }
}
