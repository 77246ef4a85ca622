//! One-shot conversion of a flat legacy source tree.

use ohlcvault_types::ArchiveError;
use tracing::{info, warn};

use crate::{ArchiveConfig, PipelineDriver, ProgressObserver, RunReport, SourceLocator};

/// Archives source files that follow the naming convention but may sit in
/// any directory under the input root.
///
/// Files are processed in global timestamp order through the same steps as
/// [`PipelineDriver`]. Re-running is safe: processed files are skipped and
/// deduplication makes repeated merges no-ops.
#[derive(Debug, Clone)]
pub struct ArchiveMigrator {
    driver: PipelineDriver,
}

impl ArchiveMigrator {
    /// Creates a migrator from run configuration.
    #[must_use]
    pub fn new(config: ArchiveConfig) -> Self {
        Self {
            driver: PipelineDriver::new(config),
        }
    }

    /// Runs without progress reporting.
    ///
    /// # Errors
    ///
    /// See [`run_with`](Self::run_with).
    pub fn run(&self) -> Result<RunReport, ArchiveError> {
        self.run_with(&())
    }

    /// Migrates every matching file under the input root.
    ///
    /// # Errors
    ///
    /// Returns an error only if the tree cannot be scanned.
    pub fn run_with<O: ProgressObserver>(&self, observer: &O) -> Result<RunReport, ArchiveError> {
        let config = self.driver.config();
        let scan = SourceLocator::new(&config.input)?
            .with_pairs(config.pairs.clone())
            .scan_legacy()?;
        for path in &scan.unmatched {
            warn!(
                path = %path.display(),
                "csv name does not follow the snapshot convention, not migrated"
            );
        }
        let files = scan.files;
        info!(
            input = %config.input.display(),
            files = files.len(),
            unmatched = scan.unmatched.len(),
            "starting migration"
        );

        let mut report = RunReport::default();
        observer.on_start(Some(files.len() as u64));
        for file in &files {
            self.driver.handle(file, &mut report, observer);
        }

        self.driver.finish(&report, observer);
        Ok(report)
    }
}
