//! Benchmark utilities for ohlcvault.
//!
//! Builds synthetic monthly partitions and measures how long it takes to
//! merge a small batch of fresh rows into them.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use ohlcvault_archive::ArchiveAppender;
use ohlcvault_format::{Codec, FormatError, Formatter, ParquetFormatter};
use ohlcvault_types::{MergeError, MergeStats, OhlcRow, YearMonth};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const PAIR_NAMES: [&str; 8] = [
    "XETHZEUR", "XXBTZEUR", "AAVEEUR", "ADAEUR", "DOTEUR", "SOLEUR", "XETHXXBT", "XXBTZUSD",
];

/// Shape of a synthetic partition and of the batch merged into it.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkConfig {
    /// Number of distinct pairs in the partition.
    pub pairs: usize,
    /// One-minute bars per pair already archived.
    pub minutes: u32,
    /// Fresh rows per merge, spread across the pairs.
    pub new_rows: usize,
    /// Row group size of the seeded partition and of new rows.
    pub row_group_size: usize,
    /// Partition codec.
    pub codec: Codec,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            pairs: 6,
            // Just under one month of minutes
            minutes: 44_000,
            new_rows: 1_000,
            row_group_size: 100_000,
            codec: Codec::Gzip,
        }
    }
}

impl BenchmarkConfig {
    /// Rows in the seeded partition.
    #[must_use]
    pub const fn existing_rows(&self) -> usize {
        self.pairs * self.minutes as usize
    }
}

/// Result of a single merge.
#[derive(Debug, Clone)]
pub struct AppendResult {
    /// Wall time of the merge, commit included.
    pub duration: Duration,
    /// Counters reported by the appender.
    pub stats: MergeStats,
    /// Partition size after the merge, in bytes.
    pub partition_size: u64,
}

impl AppendResult {
    /// Archived rows processed per second (existing plus fresh).
    #[must_use]
    pub fn rows_per_sec(&self, config: &BenchmarkConfig) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            (config.existing_rows() + config.new_rows) as f64 / secs
        } else {
            0.0
        }
    }
}

/// The month every synthetic row falls in.
#[must_use]
pub fn bench_month() -> YearMonth {
    YearMonth::from_datetime(month_start())
}

fn month_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn pair_name(index: usize) -> String {
    PAIR_NAMES
        .get(index)
        .map_or_else(|| format!("PAIR{index}"), |name| (*name).to_string())
}

fn bar(pair: &str, minute: u32) -> OhlcRow {
    let ts = month_start() + TimeDelta::minutes(i64::from(minute));
    let price = 100.0 + f64::from(minute % 500) / 7.0;
    OhlcRow::new(pair, ts, price, price + 0.5, price - 0.5, price + 0.1, 3.0)
        .with_vwap(price)
        .with_trade_count(u64::from(minute % 40))
}

/// Generates `minutes` consecutive bars for each of `pairs` pairs, pair by pair.
#[must_use]
pub fn synthetic_rows(pairs: usize, first_minute: u32, minutes: u32) -> Vec<OhlcRow> {
    (0..pairs)
        .flat_map(|p| {
            let pair = pair_name(p);
            (first_minute..first_minute + minutes).map(move |m| bar(&pair, m))
        })
        .collect()
}

/// Generates the fresh batch: bars right after the seeded ones, round-robin
/// across pairs.
#[must_use]
pub fn fresh_rows(config: &BenchmarkConfig) -> Vec<OhlcRow> {
    let pairs = config.pairs.max(1);
    (0..config.new_rows)
        .map(|i| bar(&pair_name(i % pairs), config.minutes + (i / pairs) as u32))
        .collect()
}

/// Writes the seeded partition under `root` and returns its path.
///
/// # Errors
///
/// Returns an error if the file cannot be created or encoded.
pub fn seed_partition(root: &Path, config: &BenchmarkConfig) -> Result<PathBuf, FormatError> {
    let path = ArchiveAppender::new(root).resolve_partition(bench_month());
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let rows = synthetic_rows(config.pairs, 0, config.minutes);
    ParquetFormatter::new()
        .with_codec(config.codec)
        .with_row_group_size(config.row_group_size)
        .write_rows(&rows, BufWriter::new(File::create(&path)?))?;
    Ok(path)
}

/// Returns an appender matching `config` for the archive at `root`.
#[must_use]
pub fn appender(root: &Path, config: &BenchmarkConfig) -> ArchiveAppender {
    ArchiveAppender::new(root)
        .with_codec(config.codec)
        .with_row_group_size(config.row_group_size)
}

/// Merges the fresh batch into the partition under `root` and times it.
///
/// # Errors
///
/// Returns the appender's error if the merge fails.
pub fn run_append(root: &Path, config: &BenchmarkConfig) -> Result<AppendResult, MergeError> {
    let rows = fresh_rows(config);
    let appender = appender(root, config);

    let start = Instant::now();
    let stats = appender.append(bench_month(), rows)?;
    let duration = start.elapsed();

    let partition_size = fs::metadata(appender.resolve_partition(bench_month()))
        .map(|m| m.len())
        .unwrap_or(0);
    Ok(AppendResult {
        duration,
        stats,
        partition_size,
    })
}

/// Format duration for display.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.2}s")
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Format bytes for display.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_rows_follow_seeded_rows() {
        let config = BenchmarkConfig {
            pairs: 3,
            minutes: 10,
            new_rows: 7,
            ..BenchmarkConfig::default()
        };
        let seeded = synthetic_rows(config.pairs, 0, config.minutes);
        let fresh = fresh_rows(&config);

        assert_eq!(seeded.len(), config.existing_rows());
        let last_seeded = seeded.iter().map(|r| r.timestamp).max().unwrap();
        assert!(fresh.iter().all(|r| r.timestamp > last_seeded));
        assert!(fresh.iter().all(|r| r.year_month() == bench_month()));
    }

    #[test]
    fn test_run_append_small() {
        let temp_dir = TempDir::new().unwrap();
        let config = BenchmarkConfig {
            pairs: 2,
            minutes: 100,
            new_rows: 10,
            row_group_size: 50,
            codec: Codec::Snappy,
        };
        seed_partition(temp_dir.path(), &config).unwrap();

        let result = run_append(temp_dir.path(), &config).unwrap();
        assert_eq!(result.stats.rows_appended, 10);
        assert!(result.partition_size > 0);

        let again = run_append(temp_dir.path(), &config).unwrap();
        assert_eq!(again.stats.rows_appended, 0);
        assert_eq!(again.stats.duplicates, 10);
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
