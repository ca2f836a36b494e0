//! Logging configuration for sql-diagnostics.
//!
//! Logs go to stderr so they stay apart from the progress lines printed on
//! stdout, or to a file with `--log-file`. `RUST_LOG` overrides the level.

use crate::error::{DiagnosticsError, Result};
use std::fs::{self, File};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initializes logging to `log_file` when given, otherwise to stderr.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => init_file_logging(path),
        None => {
            init_stderr_logging();
            Ok(())
        }
    }
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes logging to a file, truncating it first.
pub fn init_file_logging(path: &Path) -> Result<()> {
    let log_file = open_log_file(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false) // No ANSI colors in file output
        .init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            DiagnosticsError::config(format!("Could not create log directory {}: {e}", parent.display()))
        })?;
    }
    File::create(path).map_err(|e| {
        DiagnosticsError::config(format!("Could not create log file {}: {e}", path.display()))
    })
}
