//! Row writer abstraction.

use ohlcvault_types::OhlcRow;
use std::io::Write;
use thiserror::Error;

/// Errors that can occur while encoding or decoding rows.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Unknown compression codec.
    #[error("Unknown codec: {0}, expected one of: none, snappy, gzip, zstd")]
    UnknownCodec(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow/Parquet error.
    #[error("Parquet error: {0}")]
    Parquet(String),

    /// Data does not have the archive schema.
    #[error("Schema mismatch: {0}")]
    Schema(String),
}

/// Trait for whole-file row writers.
pub trait Formatter: Send + Sync {
    /// Writes rows to the output, in the order given.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_rows<W: Write + Send>(&self, rows: &[OhlcRow], writer: W) -> Result<(), FormatError>;

    /// Returns the file extension for this format.
    fn extension(&self) -> &str;
}
