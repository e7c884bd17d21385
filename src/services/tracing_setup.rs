//! Global tracing subscriber for the terminal host.
//!
//! The TUI owns stdout/stderr, so logs go to a file. `RUST_LOG` overrides the
//! default filter.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "telemetry_table=info";

/// Install the global subscriber writing to `log_file` (appending)
pub fn init_global(log_file: &Path) -> std::io::Result<()> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| std::io::Error::other(e.to_string()))
}
