//! Source snapshot files and their processing state.

use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{ArchiveError, YearMonth};

/// Processing state of a source file, as encoded by its file name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    /// Not yet merged into the archive (`.csv`).
    Unprocessed,
    /// Merged into the archive (`.csv.copied`).
    Processed,
    /// Failed to parse and set aside for manual inspection (`.csv.error`).
    Error,
}

impl SourceState {
    /// Returns the suffix appended after `.csv` for this state.
    #[must_use]
    pub const fn marker(&self) -> Option<&'static str> {
        match self {
            Self::Unprocessed => None,
            Self::Processed => Some("copied"),
            Self::Error => Some("error"),
        }
    }

    /// Returns true if the file will not be picked up again automatically.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Processed | Self::Error)
    }

    /// Returns the state as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Processed => "processed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One downloaded OHLC snapshot on disk.
///
/// The state is derived from the file name once, at discovery, and is not
/// re-read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pair: String,
    timestamp: NaiveDateTime,
    path: PathBuf,
    state: SourceState,
}

impl SourceFile {
    /// Creates a new source file descriptor.
    #[must_use]
    pub fn new(
        pair: impl Into<String>,
        timestamp: NaiveDateTime,
        path: impl Into<PathBuf>,
        state: SourceState,
    ) -> Self {
        Self {
            pair: pair.into(),
            timestamp,
            path: path.into(),
            state,
        }
    }

    /// Returns the trading pair encoded in the file name.
    #[must_use]
    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Returns the capture time encoded in the file name.
    #[must_use]
    pub const fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Returns the current location on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the processing state.
    #[must_use]
    pub const fn state(&self) -> SourceState {
        self.state
    }

    /// Returns the partition month derived from the capture time.
    #[must_use]
    pub fn year_month(&self) -> YearMonth {
        YearMonth::from_datetime(Utc.from_utc_datetime(&self.timestamp))
    }

    /// Returns the ordering key used for deterministic processing.
    #[must_use]
    pub fn sort_key(&self) -> (NaiveDateTime, &str, SourceState) {
        (self.timestamp, &self.pair, self.state)
    }
}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.path.display(), self.state)
    }
}

/// Counters produced by merging one source file into the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Rows parsed from the source.
    pub rows_read: usize,
    /// Rows written to the archive.
    pub rows_appended: usize,
    /// Rows dropped because their key was already archived.
    pub duplicates: usize,
    /// Partitions touched by the merge.
    pub partitions: usize,
}

impl std::ops::AddAssign for MergeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.rows_read += rhs.rows_read;
        self.rows_appended += rhs.rows_appended;
        self.duplicates += rhs.duplicates;
        self.partitions += rhs.partitions;
    }
}

/// Result of processing one source file in one run. Never persisted.
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// Rows were merged (possibly zero new rows, if all were duplicates).
    Merged(MergeStats),
    /// The file was left alone this run.
    Skipped(String),
    /// Processing failed.
    Failed(ArchiveError),
}

impl ProcessingOutcome {
    /// Returns true if the failure lies in the source data rather than the
    /// archive, so that the file may be moved to the error state.
    #[must_use]
    pub const fn is_source_failure(&self) -> bool {
        matches!(self, Self::Failed(ArchiveError::Parse(_)))
    }

    /// Returns the outcome as a short label for logging.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Merged(_) => "merged",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}
