//! Incremental Kraken OHLC archiving into monthly Parquet partitions.
//!
//! This is a facade crate that re-exports functionality from the ohlcvault
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```no_run
//! use ohlcvault_lib::prelude::*;
//!
//! let config = ArchiveConfig::new("kraken-data", "parquet-data").with_mark_errors(true);
//! let report = PipelineDriver::new(config).run()?;
//! println!(
//!     "merged {} files, appended {} rows",
//!     report.merged, report.stats.rows_appended
//! );
//! # Ok::<(), ohlcvault_lib::ArchiveError>(())
//! ```

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use ohlcvault_types::*;

// Re-export formats
pub use ohlcvault_format::{
    Codec, CsvFormatter, FormatError, Formatter, ParquetFormatter, SNAPSHOT_TIME_FORMAT,
    SourceReader,
};

// Re-export the archiving engine
pub use ohlcvault_archive::{
    ArchiveAppender, ArchiveConfig, ArchiveMigrator, ConfigError, FileFailure, FlatScan,
    KeyIndex, LockPolicy, PartitionLock, PipelineDriver, ProgressObserver, RestoreReport,
    RestoreTool, RunReport, SourceLocator, StagedMerge, StateTransitioner, Transition, naming,
};

// Re-export fetch functionality
#[cfg(feature = "fetch")]
pub use ohlcvault_fetch::{
    ClientConfig, DEFAULT_LOOKBACK_HOURS, FetchError, KrakenClient, PairSnapshot, SnapshotWriter,
    fetch_snapshots, lookback_start,
};

/// Prelude module for convenient imports.
///
/// ```
/// use ohlcvault_lib::prelude::*;
/// ```
pub mod prelude {
    pub use ohlcvault_types::{
        ArchiveError, ArchiveLayout, MergeStats, OhlcRow, ProcessingOutcome, Result, SourceFile,
        SourceState, YearMonth,
    };

    pub use ohlcvault_format::{Codec, SourceReader};

    pub use ohlcvault_archive::{
        ArchiveAppender, ArchiveConfig, ArchiveMigrator, PipelineDriver, ProgressObserver,
        RestoreTool, RunReport, SourceLocator,
    };

    #[cfg(feature = "fetch")]
    pub use ohlcvault_fetch::{
        ClientConfig, KrakenClient, PairSnapshot, SnapshotWriter, fetch_snapshots,
    };
}
