//! Error types for ohlcvault.

use std::path::PathBuf;
use thiserror::Error;

use crate::SourceState;

/// Result type alias for ohlcvault operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Umbrella error for all archive operations.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The source or archive tree could not be scanned. Fatal for a run.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// A source file is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Merging into an archive partition failed; the partition is untouched.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// A source file could not be moved to its new state.
    #[error(transparent)]
    StateTransition(#[from] StateTransitionError),

    /// A source file could not be restored.
    #[error(transparent)]
    Restore(#[from] RestoreError),
}

/// Errors raised while walking the source tree.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Failed to create a directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to read a directory.
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Problems with a CSV header row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The header row is empty.
    #[error("header row is empty")]
    EmptyHeader,

    /// The header names a column outside the schema.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// A required column is absent.
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    /// A column appears more than once.
    #[error("duplicate column '{0}'")]
    DuplicateColumn(&'static str),
}

/// Errors raised while reading a source file.
///
/// Any of these classifies the whole file as failed; rows are never
/// partially ingested.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The file could not be opened or read.
    #[error("Failed to read '{path}': {source}")]
    Read {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file has no header row.
    #[error("'{path}' is empty (missing header)")]
    MissingHeader {
        /// The offending file.
        path: PathBuf,
    },

    /// The header does not match the row schema.
    #[error("Invalid header in '{path}': {source}")]
    Header {
        /// The offending file.
        path: PathBuf,
        /// The schema violation.
        source: SchemaError,
    },

    /// A record could not be tokenized or has the wrong number of fields.
    #[error("Malformed record in '{path}' at line {line}: {reason}")]
    Malformed {
        /// The offending file.
        path: PathBuf,
        /// One-based line number.
        line: u64,
        /// Description of the problem.
        reason: String,
    },

    /// A field value could not be parsed.
    #[error("Invalid {column} value '{value}' in '{path}' at line {line}")]
    InvalidField {
        /// The offending file.
        path: PathBuf,
        /// One-based line number.
        line: u64,
        /// Canonical column name.
        column: &'static str,
        /// The raw field value.
        value: String,
    },
}

/// Errors raised while merging rows into an archive partition.
#[derive(Error, Debug)]
pub enum MergeError {
    /// Filesystem error on the partition or its temp file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The Parquet or Arrow layer failed.
    #[error("Parquet error on '{path}': {message}")]
    Parquet {
        /// The partition involved.
        path: PathBuf,
        /// Error message from the Parquet/Arrow layer.
        message: String,
    },

    /// The existing partition does not have the fixed row schema.
    #[error("Partition '{path}' has an unexpected schema: {found}")]
    SchemaMismatch {
        /// The partition involved.
        path: PathBuf,
        /// Description of the schema found.
        found: String,
    },

    /// Another process held the partition lock for every attempt.
    #[error("Partition '{path}' is locked by another run (gave up after {attempts} attempts)")]
    LockContention {
        /// The partition involved.
        path: PathBuf,
        /// Number of lock attempts made.
        attempts: u32,
    },
}

/// Errors raised while moving a source file between states.
#[derive(Error, Debug)]
pub enum StateTransitionError {
    /// The rename failed; the file keeps its prior name.
    #[error("Failed to rename '{from}' to '{to}': {source}")]
    Rename {
        /// Current path.
        from: PathBuf,
        /// Intended new path.
        to: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A file already holds the target name; neither file was touched.
    #[error("Cannot rename '{from}' to '{to}': target already exists")]
    TargetExists {
        /// Current path.
        from: PathBuf,
        /// Existing path that would have been replaced.
        to: PathBuf,
    },

    /// The delete failed; the file is still present.
    #[error("Failed to delete '{path}': {source}")]
    Delete {
        /// The path that could not be deleted.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The requested transition is not valid from the file's current state.
    #[error("Cannot {action} '{path}' in state {state}")]
    InvalidState {
        /// The file involved.
        path: PathBuf,
        /// The file's current state.
        state: SourceState,
        /// The attempted action.
        action: &'static str,
    },
}

/// Errors raised while restoring a source file to the unprocessed state.
#[derive(Error, Debug)]
pub enum RestoreError {
    /// The file is not in the processed state.
    #[error("'{0}' is not in processed state")]
    NotProcessed(PathBuf),

    /// The file is not in the error state.
    #[error("'{0}' is not in error state")]
    NotError(PathBuf),

    /// The rename back to the unprocessed name failed.
    #[error(transparent)]
    Transition(#[from] StateTransitionError),
}

/// Error for invalid partition months.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum YearMonthError {
    /// Month outside 1-12.
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    /// Year outside 0-9999.
    #[error("Invalid year: {0}")]
    InvalidYear(i32),
}

impl ArchiveError {
    /// Returns true if the error must abort the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Discovery(_))
    }
}
