//! File-based tracing setup.
//!
//! Log output goes to `<log dir>/rapid.log` through a non-blocking writer so
//! it never interleaves with the progress bars on the terminal. The filter
//! comes from `RUST_LOG` when set, otherwise from the requested level.

use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Log file name inside the log directory.
pub const LOG_FILE_NAME: &str = "rapid.log";

/// Keeps the background log writer alive. Drop it last.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Install the global subscriber writing to `dir`.
///
/// `verbose` lowers the default level from `info` to `debug`.
pub fn init_logging(dir: &Path, verbose: bool) -> std::io::Result<LoggingGuard> {
    fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let default_level = if verbose { "rapid=debug,info" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    Ok(LoggingGuard {
        _guard: guard,
        path: dir.join(LOG_FILE_NAME),
    })
}
