//! Incremental CSV to monthly Parquet archiving engine.
//!
//! This crate turns a tree of downloaded OHLC snapshot CSVs into one Parquet
//! file per calendar month, exactly once per row:
//!
//! - [`SourceLocator`] - Discovers source files and their states
//! - [`ArchiveAppender`] - Streaming, atomic, deduplicating partition merges
//! - [`StateTransitioner`] - Renames sources to `.copied` / `.error`
//! - [`PipelineDriver`] - Runs the whole pipeline and produces a [`RunReport`]
//! - [`ArchiveMigrator`] - Archives a flat legacy tree
//! - [`RestoreTool`] - Returns settled sources to the unprocessed state
//! - [`ArchiveConfig`] - Run configuration, loadable from TOML

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

mod appender;
mod config;
mod keys;
mod locator;
mod lock;
mod migrate;
pub mod naming;
mod pipeline;
mod restore;
mod transition;

pub use appender::{ArchiveAppender, StagedMerge};
pub use config::{ArchiveConfig, ConfigError};
pub use keys::{KeyIndex, KeyIndexBuilder};
pub use locator::{FlatScan, SourceIter, SourceLocator, ensure_dir};
pub use lock::{LockPolicy, PartitionLock};
pub use migrate::ArchiveMigrator;
pub use pipeline::{FileFailure, PipelineDriver, ProgressObserver, RunReport};
pub use restore::{RestoreReport, RestoreTool};
pub use transition::{StateTransitioner, Transition};
