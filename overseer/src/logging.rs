//! Logging infrastructure for overseer.
//!
//! Provides structured logging with file output and optional console
//! output:
//! - Writes to the configured log file via a non-blocking appender
//! - Optionally prints to stdout for interactive runs
//! - Configurable via the RUST_LOG environment variable (default: info)

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the logging system.
///
/// Creates the log directory if needed and sets up a file layer plus,
/// when `stdout_enabled` is set, a console layer.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created.
pub fn init_logging(
    log_dir: &str,
    log_file: &str,
    stdout_enabled: bool,
) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;

    // Make sure the log file is writable before handing it to the
    // non-blocking appender, which would fail silently.
    let log_path = Path::new(log_dir).join(log_file);
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    let stdout_layer = if stdout_enabled {
        Some(tracing_subscriber::fmt::layer().with_writer(io::stdout))
    } else {
        None
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_log_directory() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");

        // Only one global subscriber can exist per process; this test
        // cares about the filesystem side effects.
        let result = init_logging(&log_dir.to_string_lossy(), "overseer.log", false);
        assert!(log_dir.is_dir());
        assert!(log_dir.join("overseer.log").exists());
        drop(result);
    }
}
