//! Tracing subscriber setup.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Name of the run log appended under the input root.
pub(crate) const LOG_FILE_NAME: &str = "pipeline.log";

/// Installs the global subscriber: a filter from `RUST_LOG` or `level`, a
/// stderr layer, and a plain-text layer appending to `<input>/pipeline.log`.
pub(crate) fn init(level: &str, input: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log filter: {level}"))?;

    fs::create_dir_all(input)
        .with_context(|| format!("Failed to create input directory {}", input.display()))?;
    let log_path = input.join(LOG_FILE_NAME);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")
}
