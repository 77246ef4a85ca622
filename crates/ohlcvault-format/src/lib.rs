//! CSV and Parquet codecs for the ohlcvault OHLC archiver.
//!
//! - [`SourceReader`] - validating reader for downloaded snapshot CSVs
//! - [`CsvFormatter`] - snapshot CSV writer
//! - [`ParquetFormatter`] - one-shot partition writer
//!
//! The [`parquet`](crate::parquet) module also holds the archive schema and
//! the Arrow conversions used by the streaming merge.

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod csv;
mod formatter;
pub mod parquet;
mod source;

pub use crate::csv::{CsvFormatter, SNAPSHOT_TIME_FORMAT};
pub use crate::parquet::{Codec, ParquetFormatter};
pub use formatter::{FormatError, Formatter};
pub use source::SourceReader;
