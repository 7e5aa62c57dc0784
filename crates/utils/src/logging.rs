//! provides logging helpers

use std::env;
use std::path::Path;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Environment variable naming the log file (or directory) to write to.
pub const LOG_PATH_ENV_VAR: &str = "STATPIPE_LOG_PATH";

const DEFAULT_LOG_PREFIX: &str = "statpipe.log";
const MAX_LOG_FILES: usize = 3;

/// initiate the global tracing subscriber
///
/// Logs go to a daily rolling file when `log_path` (or `STATPIPE_LOG_PATH`)
/// is set, otherwise to stderr. The returned guard flushes the non-blocking
/// writer on drop and must be kept alive for the life of the process.
pub fn init(log_path: Option<PathBuf>) -> WorkerGuard {
    let log_path = log_path.or_else(|| env::var_os(LOG_PATH_ENV_VAR).map(PathBuf::from));

    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let mut appender_error = None;
    let (writer, guard, ansi) = match log_path {
        Some(path) => {
            let (dir, prefix) = rotation_target(&path);
            match RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .max_log_files(MAX_LOG_FILES)
                .build(&dir)
            {
                Ok(appender) => {
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    (writer, guard, false)
                }
                Err(err) => {
                    appender_error = Some(format!(
                        "failed to create rolling file appender at {}: {err}; falling back to stderr",
                        dir.display()
                    ));
                    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
                    (writer, guard, true)
                }
            }
        }
        None => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            (writer, guard, true)
        }
    };

    let fmt_layer = layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(ansi)
        .with_filter(env_filter);

    registry().with(fmt_layer).init();

    if let Some(msg) = appender_error {
        tracing::error!("{msg}");
    }
    guard
}

/// Splits a log path into the rotation directory and the file name prefix.
///
/// A directory gets the default prefix; a bare file name rotates in the
/// current directory.
pub fn rotation_target(path: &Path) -> (PathBuf, String) {
    if path.is_dir() {
        return (path.to_path_buf(), DEFAULT_LOG_PREFIX.to_string());
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_LOG_PREFIX);
    (dir.to_path_buf(), prefix.to_string())
}
