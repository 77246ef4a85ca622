//! Incremental archiving and legacy migration.

use anyhow::{Context, Result};
use ohlcvault_lib::prelude::*;

use crate::display::{FileProgress, print_failures, print_run_summary};

/// Runs the pipeline (or the migrator) on a blocking thread and returns the
/// process exit code for its report.
pub(crate) async fn archive(config: ArchiveConfig, migrate: bool, quiet: bool) -> Result<u8> {
    let progress = FileProgress::new(quiet);

    let report = tokio::task::spawn_blocking(move || {
        if migrate {
            ArchiveMigrator::new(config).run_with(&progress)
        } else {
            PipelineDriver::new(config).run_with(&progress)
        }
    })
    .await
    .context("Archive task panicked")??;

    if quiet {
        print_failures(&report);
    } else {
        print_run_summary(&report);
    }
    Ok(report.exit_code())
}
