//! Run configuration.

use directories::ProjectDirs;
use ohlcvault_format::Codec;
use ohlcvault_types::ArchiveLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::LockPolicy;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`ArchiveConfig`].
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        /// The offending file.
        path: PathBuf,
        /// The underlying TOML error.
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for one archiving run.
///
/// Built once and handed to [`PipelineDriver`](crate::PipelineDriver); no
/// component reads configuration from anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Root of the source snapshot tree.
    pub input: PathBuf,
    /// Root of the Parquet archive.
    pub output: PathBuf,
    /// Layout for partitions that do not exist yet.
    pub layout: ArchiveLayout,
    /// Codec for partitions that do not exist yet.
    pub compression: Codec,
    /// Maximum rows per newly written row group.
    pub row_group_size: usize,
    /// Rows per decoded batch when reading an existing partition.
    pub read_batch_size: usize,
    /// Move unparseable sources to the error state.
    pub mark_errors: bool,
    /// Delete sources once they are processed.
    pub delete_processed: bool,
    /// Pairs to process; empty means all.
    pub pairs: Vec<String>,
    /// Partition lock retry policy.
    pub lock: LockPolicy,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::from("parquet-data"),
            layout: ArchiveLayout::default(),
            compression: Codec::default(),
            row_group_size: 100_000,
            read_batch_size: 8_192,
            mark_errors: false,
            delete_processed: false,
            pairs: Vec::new(),
            lock: LockPolicy::default(),
        }
    }
}

impl ArchiveConfig {
    /// Creates a configuration for the given source and archive roots.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    /// Sets the layout for new partitions.
    #[must_use]
    pub const fn with_layout(mut self, layout: ArchiveLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the codec for new partitions.
    #[must_use]
    pub const fn with_compression(mut self, codec: Codec) -> Self {
        self.compression = codec;
        self
    }

    /// Sets the row group size for new rows.
    #[must_use]
    pub const fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Sets the read batch size.
    #[must_use]
    pub const fn with_read_batch_size(mut self, size: usize) -> Self {
        self.read_batch_size = size;
        self
    }

    /// Sets whether parse failures move sources to the error state.
    #[must_use]
    pub const fn with_mark_errors(mut self, mark: bool) -> Self {
        self.mark_errors = mark;
        self
    }

    /// Sets whether processed sources are deleted.
    #[must_use]
    pub const fn with_delete_processed(mut self, delete: bool) -> Self {
        self.delete_processed = delete;
        self
    }

    /// Restricts the run to the given pairs.
    #[must_use]
    pub fn with_pairs<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pairs = pairs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the lock retry policy.
    #[must_use]
    pub const fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock = policy;
        self
    }

    /// Parses configuration from TOML text. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid or a value is out of range.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Returns the default configuration file location.
    ///
    /// - Linux: `~/.config/ohlcvault/config.toml`
    /// - macOS: `~/Library/Application Support/ohlcvault/config.toml`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ohlcvault")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads the default configuration file, or the defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_toml_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.row_group_size == 0 {
            return Err(ConfigError::Invalid("row_group_size must be positive".into()));
        }
        if self.read_batch_size == 0 {
            return Err(ConfigError::Invalid("read_batch_size must be positive".into()));
        }
        if self.lock.max_attempts == 0 {
            return Err(ConfigError::Invalid("lock.max_attempts must be positive".into()));
        }
        Ok(())
    }
}
