//! Source file naming convention.
//!
//! Snapshots are named `<YYYY>-<MM>-<DD>-<HH>-<mm>-<PAIR>.csv`, with the
//! processing state encoded as an extra suffix (`.copied` or `.error`).

use chrono::{NaiveDate, NaiveDateTime};
use ohlcvault_types::{SourceFile, SourceState};
use std::path::{Path, PathBuf};

/// Extension of unprocessed source files.
pub const SOURCE_EXTENSION: &str = "csv";

/// Returns the file name for a snapshot captured at `timestamp`.
#[must_use]
pub fn source_file_name(timestamp: NaiveDateTime, pair: &str) -> String {
    format!(
        "{}-{pair}.{SOURCE_EXTENSION}",
        timestamp.format("%Y-%m-%d-%H-%M")
    )
}

/// Returns true if `pair` is a valid pair segment (`[A-Za-z0-9._]+`).
#[must_use]
pub fn is_valid_pair(pair: &str) -> bool {
    !pair.is_empty()
        && pair
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// Splits a file name into its unprocessed base name and state.
fn split_state(name: &str) -> Option<(&str, SourceState)> {
    let csv_suffix = format!(".{SOURCE_EXTENSION}");
    for state in [SourceState::Processed, SourceState::Error] {
        if let Some(marker) = state.marker()
            && let Some(base) = name.strip_suffix(marker).and_then(|s| s.strip_suffix('.'))
            && base.ends_with(&csv_suffix)
        {
            return Some((base, state));
        }
    }
    name.ends_with(&csv_suffix)
        .then_some((name, SourceState::Unprocessed))
}

/// Parses a file name into `(timestamp, pair, state)`.
///
/// Returns `None` for any name outside the convention.
#[must_use]
pub fn parse_file_name(name: &str) -> Option<(NaiveDateTime, &str, SourceState)> {
    let (base, state) = split_state(name)?;
    let stem = base.strip_suffix(SOURCE_EXTENSION)?.strip_suffix('.')?;

    let mut parts = stem.splitn(6, '-');
    let mut number = |width: usize| -> Option<u32> {
        let part = parts.next()?;
        (part.len() == width && part.bytes().all(|b| b.is_ascii_digit()))
            .then(|| part.parse().ok())
            .flatten()
    };

    let year = number(4)?;
    let month = number(2)?;
    let day = number(2)?;
    let hour = number(2)?;
    let minute = number(2)?;
    let pair = parts.next()?;
    if !is_valid_pair(pair) {
        return None;
    }

    let timestamp = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?
        .and_hms_opt(hour, minute, 0)?;
    Some((timestamp, pair, state))
}

/// Classifies a path as a source file, if its name follows the convention.
#[must_use]
pub fn classify(path: &Path) -> Option<SourceFile> {
    let name = path.file_name()?.to_str()?;
    let (timestamp, pair, state) = parse_file_name(name)?;
    Some(SourceFile::new(pair, timestamp, path, state))
}

/// Returns the path the file would have in `state`.
///
/// Returns `None` if the current name does not follow the convention.
#[must_use]
pub fn path_in_state(path: &Path, state: SourceState) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let (base, _) = split_state(name)?;
    let target = match state.marker() {
        Some(marker) => format!("{base}.{marker}"),
        None => base.to_string(),
    };
    Some(path.with_file_name(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_source_file_name() {
        assert_eq!(
            source_file_name(ts(10), "XETHZEUR"),
            "2024-01-05-10-00-XETHZEUR.csv"
        );
    }

    #[test]
    fn test_parse_states() {
        let (t, pair, state) = parse_file_name("2024-01-05-10-00-XETHZEUR.csv").unwrap();
        assert_eq!(t, ts(10));
        assert_eq!(pair, "XETHZEUR");
        assert_eq!(state, SourceState::Unprocessed);

        let (_, _, state) = parse_file_name("2024-01-05-10-00-XETHZEUR.csv.copied").unwrap();
        assert_eq!(state, SourceState::Processed);

        let (_, _, state) = parse_file_name("2024-01-05-10-00-XETHZEUR.csv.error").unwrap();
        assert_eq!(state, SourceState::Error);
    }

    #[test]
    fn test_parse_dotted_pair() {
        let (_, pair, _) = parse_file_name("2024-01-05-22-00-XETHXXBT.d.csv").unwrap();
        assert_eq!(pair, "XETHXXBT.d");
    }

    #[test]
    fn test_parse_rejects_unrelated() {
        for name in [
            "pipeline.log",
            "2024-01.parquet",
            "2024-01-05-10-00-XETHZEUR.csv.partial",
            "2024-01-05-10-00-XETHZEUR.txt",
            "2024-01-05-10-00-.csv",
            "2024-1-05-10-00-XETHZEUR.csv",
            "2024-13-05-10-00-XETHZEUR.csv",
            "2024-01-05-10-00-XETH-ZEUR.csv",
            "2024-01-05-10-00-XETHZEUR.csv.copied.error",
        ] {
            assert!(parse_file_name(name).is_none(), "{name} should not parse");
        }
    }

    #[test]
    fn test_path_in_state() {
        let path = Path::new("in/2024/01/2024-01-05-10-00-XETHZEUR.csv");

        let copied = path_in_state(path, SourceState::Processed).unwrap();
        assert_eq!(
            copied,
            PathBuf::from("in/2024/01/2024-01-05-10-00-XETHZEUR.csv.copied")
        );
        assert_eq!(
            path_in_state(&copied, SourceState::Unprocessed).unwrap(),
            path
        );
        assert_eq!(
            path_in_state(&copied, SourceState::Error).unwrap(),
            PathBuf::from("in/2024/01/2024-01-05-10-00-XETHZEUR.csv.error")
        );
    }

    #[test]
    fn test_classify() {
        let file = classify(Path::new("in/2024/01/2024-01-05-10-00-AAVEEUR.csv.error")).unwrap();

        assert_eq!(file.pair(), "AAVEEUR");
        assert_eq!(file.state(), SourceState::Error);
        assert!(classify(Path::new("in/2024/01/notes.md")).is_none());
    }
}
