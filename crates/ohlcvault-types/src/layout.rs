//! Archive partition path layouts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::YearMonth;

/// File extension of archive partitions.
pub const PARTITION_EXTENSION: &str = "parquet";

/// On-disk layout of monthly partitions under the archive root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveLayout {
    /// `<root>/<YYYY>/<MM>/<YYYY>-<MM>.parquet`
    #[default]
    Nested,
    /// `<root>/<YYYY>/<MM>.parquet`
    Flat,
}

impl ArchiveLayout {
    /// Returns the partition file path for the given month under `root`.
    #[must_use]
    pub fn partition_path(&self, root: &Path, ym: YearMonth) -> PathBuf {
        match self {
            Self::Nested => root
                .join(ym.year_dir())
                .join(ym.month_dir())
                .join(format!("{ym}.{PARTITION_EXTENSION}")),
            Self::Flat => root
                .join(ym.year_dir())
                .join(format!("{}.{PARTITION_EXTENSION}", ym.month_dir())),
        }
    }

    /// Returns the layout as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nested => "nested",
            Self::Flat => "flat",
        }
    }

    /// Returns all layouts, preferred first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Nested, Self::Flat]
    }
}

impl std::fmt::Display for ArchiveLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ArchiveLayout {
    type Err = LayoutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nested" | "v2" => Ok(Self::Nested),
            "flat" | "v1" => Ok(Self::Flat),
            _ => Err(LayoutParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid layout string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutParseError(String);

impl std::fmt::Display for LayoutParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid archive layout '{}', expected one of: nested, flat",
            self.0
        )
    }
}

impl std::error::Error for LayoutParseError {}
