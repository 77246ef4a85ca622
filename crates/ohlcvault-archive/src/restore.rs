//! Returning settled source files to the unprocessed state.

use ohlcvault_types::{DiscoveryError, RestoreError, SourceFile, SourceState};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{SourceLocator, StateTransitioner};

/// Summary of a bulk restore.
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// New paths of the restored files.
    pub restored: Vec<PathBuf>,
    /// Files that could not be restored.
    pub failed: Vec<(PathBuf, RestoreError)>,
}

impl RestoreReport {
    /// Returns true if every file was restored.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Renames `.csv.copied` and `.csv.error` files back to `.csv`.
///
/// Partitions are never touched; restored files are deduplicated against
/// the archive on the next run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreTool {
    transitioner: StateTransitioner,
}

impl RestoreTool {
    /// Creates a restore tool.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            transitioner: StateTransitioner::new(false, false),
        }
    }

    /// Restores one processed file.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::NotProcessed`] for any other state.
    pub fn restore(&self, file: &SourceFile) -> Result<PathBuf, RestoreError> {
        if file.state() != SourceState::Processed {
            return Err(RestoreError::NotProcessed(file.path().to_path_buf()));
        }
        Ok(self.transitioner.restore(file, SourceState::Processed)?)
    }

    /// Restores one file from the error state.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::NotError`] for any other state.
    pub fn restore_error(&self, file: &SourceFile) -> Result<PathBuf, RestoreError> {
        if file.state() != SourceState::Error {
            return Err(RestoreError::NotError(file.path().to_path_buf()));
        }
        Ok(self.transitioner.restore(file, SourceState::Error)?)
    }

    /// Restores every processed file under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the tree cannot be scanned; per-file
    /// failures are collected in the report.
    pub fn restore_all(&self, root: &Path) -> Result<RestoreReport, DiscoveryError> {
        self.restore_matching(root, SourceState::Processed, |file| self.restore(file))
    }

    /// Restores every file in the error state under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the tree cannot be scanned.
    pub fn restore_errors(&self, root: &Path) -> Result<RestoreReport, DiscoveryError> {
        self.restore_matching(root, SourceState::Error, |file| self.restore_error(file))
    }

    fn restore_matching(
        &self,
        root: &Path,
        state: SourceState,
        restore: impl Fn(&SourceFile) -> Result<PathBuf, RestoreError>,
    ) -> Result<RestoreReport, DiscoveryError> {
        let files = SourceLocator::new(root)?.scan_flat()?;
        let mut report = RestoreReport::default();

        for file in files.iter().filter(|f| f.state() == state) {
            match restore(file) {
                Ok(path) => report.restored.push(path),
                Err(e) => {
                    warn!(path = %file.path().display(), error = %e, "restore failed");
                    report.failed.push((file.path().to_path_buf(), e));
                }
            }
        }

        info!(
            root = %root.display(),
            state = %state,
            restored = report.restored.len(),
            failed = report.failed.len(),
            "restore finished"
        );
        Ok(report)
    }
}
