//! Tracing setup
//!
//! Console output goes to stderr at the verbosity picked on the command
//! line. When a log file is given, everything at `info` and above is also
//! appended there through a non-blocking writer. `RUST_LOG` overrides both
//! filters.

use std::io::IsTerminal;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Level written to the log file unless `RUST_LOG` says otherwise
const FILE_LOG_LEVEL: &str = "info";

/// Keeps the file writer flushing; hold it until the process exits
#[derive(Debug)]
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

/// Console level for the `-q` / `-v` flags
pub fn console_level(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    }
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()))
}

/// Install the global subscriber
pub fn init(console_level: &str, log_file: Option<&Path>) -> LoggingGuard {
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .with_filter(filter(console_level));

    let (file_layer, guard) = match log_file.map(open_log_file) {
        Some(Ok(file)) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter(FILE_LOG_LEVEL));
            (Some(layer), Some(guard))
        }
        Some(Err((path, e))) => {
            eprintln!("Warning: failed to open log file {}: {}", path, e);
            (None, None)
        }
        None => (None, None),
    };

    if tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        return LoggingGuard { _guard: None };
    }

    LoggingGuard { _guard: guard }
}

fn open_log_file(path: &Path) -> Result<std::fs::File, (String, std::io::Error)> {
    let open = || {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
    };
    open().map_err(|e| (path.display().to_string(), e))
}
