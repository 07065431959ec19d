//! Logging infrastructure.
//!
//! Structured logging via `tracing`, configurable through the `RUST_LOG`
//! environment variable. Hosts embedding the library can install their
//! own subscriber instead; these helpers cover the common cases of
//! console-only output and console plus a session log file.

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for file logging to flush.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize console-only logging.
///
/// Defaults to `info` when `RUST_LOG` is unset.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Initialize logging to the console and a session log file.
///
/// The log file is truncated at session start so each run reads from the
/// top. The returned guard must be kept alive for the file writer to
/// flush.
///
/// # Errors
///
/// Returns an error when the log directory cannot be created or the log
/// file cannot be truncated.
pub fn init_file_logging(log_dir: &str, log_file: &str) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(Path::new(log_dir).join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
