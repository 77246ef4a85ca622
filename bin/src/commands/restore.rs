//! Restoring settled source files.

use anyhow::{Context, Result};
use ohlcvault_lib::prelude::*;
use std::path::PathBuf;

use crate::display::print_restore_summary;

/// Restores processed (or error) files under `input`. Returns 2 if any file
/// could not be restored.
pub(crate) async fn restore(input: PathBuf, errors: bool, quiet: bool) -> Result<u8> {
    let report = tokio::task::spawn_blocking(move || {
        let tool = RestoreTool::new();
        if errors {
            tool.restore_errors(&input)
        } else {
            tool.restore_all(&input)
        }
    })
    .await
    .context("Restore task panicked")?
    .context("Failed to scan the source tree")?;

    if !quiet || !report.is_clean() {
        print_restore_summary(&report);
    }
    Ok(if report.is_clean() { 0 } else { 2 })
}
