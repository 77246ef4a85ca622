//! Source file state transitions.

use ohlcvault_types::{ProcessingOutcome, SourceFile, SourceState, StateTransitionError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{ArchiveConfig, naming};

/// What a transition did to a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The file was renamed.
    Renamed {
        /// Previous path.
        from: PathBuf,
        /// New path.
        to: PathBuf,
    },
    /// The file was deleted.
    Deleted(PathBuf),
    /// The file was left as it was.
    Unchanged,
}

/// The only component that renames or deletes source files.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateTransitioner {
    mark_errors: bool,
    delete_processed: bool,
}

impl StateTransitioner {
    /// Creates a transitioner.
    #[must_use]
    pub const fn new(mark_errors: bool, delete_processed: bool) -> Self {
        Self {
            mark_errors,
            delete_processed,
        }
    }

    /// Creates a transitioner from run configuration.
    #[must_use]
    pub const fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(config.mark_errors, config.delete_processed)
    }

    /// Applies the outcome of processing an unprocessed file.
    ///
    /// | Outcome | Effect |
    /// |---|---|
    /// | `Merged` | rename to `.csv.copied`, then delete if configured |
    /// | parse failure, marking on | rename to `.csv.error` |
    /// | anything else | no change |
    ///
    /// # Errors
    ///
    /// Returns [`StateTransitionError::InvalidState`] if the file is not
    /// unprocessed, or a rename/delete error.
    pub fn apply(
        &self,
        file: &SourceFile,
        outcome: &ProcessingOutcome,
    ) -> Result<Transition, StateTransitionError> {
        if file.state() != SourceState::Unprocessed {
            return Err(StateTransitionError::InvalidState {
                path: file.path().to_path_buf(),
                state: file.state(),
                action: "apply an outcome to",
            });
        }

        match outcome {
            ProcessingOutcome::Merged(_) => {
                let to = target(file.path(), SourceState::Processed, file.state())?;
                rename(file.path(), &to, SourceState::Processed)?;
                if self.delete_processed {
                    delete(&to)?;
                    return Ok(Transition::Deleted(to));
                }
                Ok(Transition::Renamed {
                    from: file.path().to_path_buf(),
                    to,
                })
            }
            ProcessingOutcome::Failed(_) if outcome.is_source_failure() && self.mark_errors => {
                let to = target(file.path(), SourceState::Error, file.state())?;
                rename(file.path(), &to, SourceState::Error)?;
                Ok(Transition::Renamed {
                    from: file.path().to_path_buf(),
                    to,
                })
            }
            ProcessingOutcome::Failed(_) | ProcessingOutcome::Skipped(_) => Ok(Transition::Unchanged),
        }
    }

    /// Deletes a file discovered in the processed state.
    ///
    /// # Errors
    ///
    /// Refuses any other state, and reports delete failures.
    pub fn delete_processed(&self, file: &SourceFile) -> Result<Transition, StateTransitionError> {
        if file.state() != SourceState::Processed {
            return Err(StateTransitionError::InvalidState {
                path: file.path().to_path_buf(),
                state: file.state(),
                action: "delete",
            });
        }
        delete(file.path())?;
        Ok(Transition::Deleted(file.path().to_path_buf()))
    }

    /// Renames a file in state `from` back to its unprocessed name.
    ///
    /// # Errors
    ///
    /// Returns [`StateTransitionError::InvalidState`] if the file is not in
    /// state `from`, [`StateTransitionError::TargetExists`] if an
    /// unprocessed file with the same name is present, or a rename error.
    pub fn restore(
        &self,
        file: &SourceFile,
        from: SourceState,
    ) -> Result<PathBuf, StateTransitionError> {
        if file.state() != from || from == SourceState::Unprocessed {
            return Err(StateTransitionError::InvalidState {
                path: file.path().to_path_buf(),
                state: file.state(),
                action: "restore",
            });
        }
        let to = target(file.path(), SourceState::Unprocessed, file.state())?;
        rename(file.path(), &to, SourceState::Unprocessed)?;
        Ok(to)
    }
}

fn target(
    path: &Path,
    to: SourceState,
    current: SourceState,
) -> Result<PathBuf, StateTransitionError> {
    naming::path_in_state(path, to).ok_or_else(|| StateTransitionError::InvalidState {
        path: path.to_path_buf(),
        state: current,
        action: "rename",
    })
}

/// Renames `from` to `to`, logging the outcome.
///
/// Only a `.copied` target may be replaced: its rows are already archived.
/// Unprocessed and error files hold rows that are not, so an existing
/// target in those states fails the rename and leaves both files in place.
fn rename(from: &Path, to: &Path, state: SourceState) -> Result<(), StateTransitionError> {
    if state != SourceState::Processed && fs::symlink_metadata(to).is_ok() {
        warn!(from = %from.display(), to = %to.display(), "rename target already exists");
        return Err(StateTransitionError::TargetExists {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
    }

    match fs::rename(from, to) {
        Ok(()) => {
            info!(from = %from.display(), to = %to.display(), "renamed source file");
            Ok(())
        }
        Err(source) => {
            warn!(from = %from.display(), error = %source, "failed to rename source file");
            Err(StateTransitionError::Rename {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })
        }
    }
}

fn delete(path: &Path) -> Result<(), StateTransitionError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "deleted source file");
            Ok(())
        }
        Err(source) => {
            warn!(path = %path.display(), error = %source, "failed to delete source file");
            Err(StateTransitionError::Delete {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}
