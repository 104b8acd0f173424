//! Logging setup for the command-line front-end
//!
//! Log lines go to a non-blocking file writer at `<data_dir>/modsync.log`.
//! The filter is read from `MODSYNC_LOG` and defaults to `info`.

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_ENV: &str = "MODSYNC_LOG";
pub const DEFAULT_FILTER: &str = "info";

/// Keeps the background writer alive; dropping it flushes the log file
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Build the filter from `MODSYNC_LOG`, falling back to `info`
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber writing to `log_path`.
///
/// `json` switches the file format to one JSON object per line.
pub fn init_logging(log_path: &Path, json: bool) -> Result<LoggingGuard, io::Error> {
    let log_dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(log_dir)?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry().with(env_filter());
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init();
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_rejects_path_without_file_name() {
        let result = init_logging(Path::new("/"), false);

        assert!(result.is_err());
    }
}
