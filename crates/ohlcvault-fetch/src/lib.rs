//! Kraken OHLC snapshot downloader for ohlcvault.
//!
//! This crate produces the source files the archiver consumes:
//!
//! - [`url`] - Kraken public REST endpoints
//! - [`KrakenClient`] - HTTP client with connection pooling and retries
//! - [`parse::parse_ohlc`] - Decoding of OHLC responses into rows
//! - [`fetch_snapshots`] - Concurrent per-pair snapshot stream
//! - [`SnapshotWriter`] - Atomic placement of snapshots in the source tree

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
pub mod parse;
mod stream;
pub mod url;
mod writer;

pub use client::{ClientConfig, FetchError, KrakenClient};
pub use stream::{DEFAULT_LOOKBACK_HOURS, PairSnapshot, fetch_snapshots, lookback_start};
pub use writer::SnapshotWriter;
