//! Core types for the ohlcvault OHLC archiver.
//!
//! This crate provides the fundamental data structures used throughout ohlcvault:
//!
//! - [`OhlcRow`] - A single OHLC observation, keyed by `(pair, timestamp)`
//! - [`RowSchema`] - The fixed column set and CSV header validation
//! - [`SourceFile`] - A downloaded snapshot and its processing state
//! - [`YearMonth`] - The archive partition key
//! - [`ArchiveLayout`] - Partition path conventions
//! - [`ProcessingOutcome`] - Per-file result of one run

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod layout;
mod row;
mod schema;
mod source;
mod year_month;

pub use error::{
    ArchiveError, DiscoveryError, MergeError, ParseError, RestoreError, Result, SchemaError,
    StateTransitionError, YearMonthError,
};
pub use layout::{ArchiveLayout, LayoutParseError, PARTITION_EXTENSION};
pub use row::{OhlcRow, RowKey};
pub use schema::{
    Column, ColumnMap, LEGACY_COUNTPAIR, RowSchema, parse_timestamp, split_countpair,
};
pub use source::{MergeStats, ProcessingOutcome, SourceFile, SourceState};
pub use year_month::YearMonth;
