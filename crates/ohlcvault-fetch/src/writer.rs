//! Placing snapshots in the source tree.

use chrono::Datelike;
use ohlcvault_archive::naming;
use ohlcvault_format::{CsvFormatter, Formatter};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{FetchError, PairSnapshot};

/// Writes snapshots as `<root>/<YYYY>/<MM>/<YYYY>-<MM>-<DD>-<HH>-<mm>-<PAIR>.csv`.
///
/// Each file is written under a `.partial` name and renamed into place once
/// synced, so discovery never observes a half-written snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    root: PathBuf,
    formatter: CsvFormatter,
}

impl SnapshotWriter {
    /// Creates a writer rooted at the source tree `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            formatter: CsvFormatter::new(),
        }
    }

    /// Returns the source tree root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path a snapshot is stored at.
    #[must_use]
    pub fn snapshot_path(&self, snapshot: &PairSnapshot) -> PathBuf {
        let stamp = snapshot.file_stamp();
        self.root
            .join(format!("{:04}", stamp.year()))
            .join(format!("{:02}", stamp.month()))
            .join(naming::source_file_name(stamp, &snapshot.pair))
    }

    /// Writes one snapshot, returning its path.
    ///
    /// Empty snapshots are not written and yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidPair`] for names outside the naming
    /// convention, or a write error. A failed write leaves no visible file.
    pub fn write(&self, snapshot: &PairSnapshot) -> Result<Option<PathBuf>, FetchError> {
        if !naming::is_valid_pair(&snapshot.pair) {
            return Err(FetchError::InvalidPair(snapshot.pair.clone()));
        }
        if snapshot.is_empty() {
            debug!(pair = %snapshot.pair, "no bars, nothing written");
            return Ok(None);
        }

        let path = self.snapshot_path(snapshot);
        let mut partial = path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let result = self.write_file(&partial, snapshot).and_then(|()| {
            fs::rename(&partial, &path).map_err(|source| FetchError::Write {
                path: path.clone(),
                source,
            })
        });
        if result.is_err() {
            let _ = fs::remove_file(&partial);
        }
        result?;

        info!(path = %path.display(), rows = snapshot.len(), "wrote snapshot");
        Ok(Some(path))
    }

    fn write_file(&self, partial: &Path, snapshot: &PairSnapshot) -> Result<(), FetchError> {
        let io_error = |source| FetchError::Write {
            path: partial.to_path_buf(),
            source,
        };

        if let Some(dir) = partial.parent() {
            fs::create_dir_all(dir).map_err(io_error)?;
        }
        let mut writer = BufWriter::new(File::create(partial).map_err(io_error)?);
        self.formatter
            .write_rows(&snapshot.rows, &mut writer)
            .map_err(|source| FetchError::Format {
                path: partial.to_path_buf(),
                source,
            })?;
        writer.flush().map_err(io_error)?;
        let file = writer.into_inner().map_err(|e| io_error(e.into_error()))?;
        file.sync_all().map_err(io_error)
    }
}
