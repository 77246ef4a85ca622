//! Validating reader for downloaded OHLC snapshot files.

use csv::{ReaderBuilder, StringRecord, Trim};
use ohlcvault_types::{
    Column, ColumnMap, OhlcRow, ParseError, RowSchema, parse_timestamp, split_countpair,
};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads a snapshot CSV into rows, all or nothing.
///
/// The first record is the header and is resolved against [`RowSchema`].
/// Every following record must have exactly the header's field count and
/// parse completely; one bad record fails the whole file.
#[derive(Debug, Clone, Copy)]
pub struct SourceReader {
    delimiter: u8,
}

impl Default for SourceReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceReader {
    /// Creates a comma-delimited reader.
    #[must_use]
    pub const fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Sets the field delimiter.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Reads the file at `path`.
    ///
    /// Rows without a `pair` column, or with an empty pair cell, take
    /// `fallback_pair` (normally the pair from the file name).
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] carrying the path and, where known, the line.
    pub fn read_path(&self, path: &Path, fallback_pair: &str) -> Result<Vec<OhlcRow>, ParseError> {
        let file = File::open(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.read_from(file, path, fallback_pair)
    }

    /// Reads CSV data from any reader; `path` is used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] carrying the path and, where known, the line.
    pub fn read_from<R: Read>(
        &self,
        input: R,
        path: &Path,
        fallback_pair: &str,
    ) -> Result<Vec<OhlcRow>, ParseError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .from_reader(input);

        let mut records = reader.records();

        let header = match records.next() {
            None => {
                return Err(ParseError::MissingHeader {
                    path: path.to_path_buf(),
                });
            }
            Some(record) => record.map_err(|e| csv_error(path, &e))?,
        };
        let map = RowSchema::resolve(header.iter()).map_err(|source| ParseError::Header {
            path: path.to_path_buf(),
            source,
        })?;

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(|e| csv_error(path, &e))?;
            let line = record.position().map_or(0, csv::Position::line);
            let row = RecordParser {
                map: &map,
                record: &record,
                path,
                line,
            }
            .parse(fallback_pair)?;
            rows.push(row);
        }

        Ok(rows)
    }
}

struct RecordParser<'a> {
    map: &'a ColumnMap,
    record: &'a StringRecord,
    path: &'a Path,
    line: u64,
}

impl RecordParser<'_> {
    fn parse(&self, fallback_pair: &str) -> Result<OhlcRow, ParseError> {
        if !self.map.accepts(self.record.len()) {
            return Err(ParseError::Malformed {
                path: self.path.to_path_buf(),
                line: self.line,
                reason: format!(
                    "expected {} fields, found {}",
                    self.map.field_count(),
                    self.record.len()
                ),
            });
        }

        let raw_ts = self.cell(Column::Timestamp).unwrap_or_default();
        let timestamp =
            parse_timestamp(raw_ts).ok_or_else(|| self.invalid(Column::Timestamp, raw_ts))?;

        let volume = self.required_f64(Column::Volume)?;
        if volume < 0.0 {
            return Err(self.invalid(Column::Volume, self.cell(Column::Volume).unwrap_or_default()));
        }

        let (raw_count, raw_pair) = self.count_and_pair()?;
        let pair = raw_pair.filter(|p| !p.is_empty()).unwrap_or(fallback_pair);

        Ok(OhlcRow {
            pair: pair.to_string(),
            timestamp,
            open: self.required_f64(Column::Open)?,
            high: self.required_f64(Column::High)?,
            low: self.required_f64(Column::Low)?,
            close: self.required_f64(Column::Close)?,
            vwap: self.optional(Column::Vwap, self.cell(Column::Vwap), |v| {
                v.parse::<f64>().ok()
            })?,
            volume,
            trade_count: self.optional(Column::TradeCount, raw_count, parse_count)?,
        })
    }

    /// Returns the raw `trade_count` and `pair` cells.
    ///
    /// A legacy `countpair` field is either one joined cell (`3AAVEEUR`)
    /// or, when the record has one extra field, two separate cells.
    fn count_and_pair(&self) -> Result<(Option<&str>, Option<&str>), ParseError> {
        let Some(idx) = self.map.countpair() else {
            return Ok((self.cell(Column::TradeCount), self.cell(Column::Pair)));
        };

        if self.record.len() > self.map.field_count() {
            return Ok((self.record.get(idx), self.record.get(idx + 1)));
        }

        match self.record.get(idx).unwrap_or_default() {
            "" => Ok((None, None)),
            joined => split_countpair(joined)
                .map(|(count, pair)| (Some(count), Some(pair)))
                .ok_or_else(|| self.invalid(Column::TradeCount, joined)),
        }
    }

    fn cell(&self, column: Column) -> Option<&str> {
        self.map.get(column).and_then(|idx| self.record.get(idx))
    }

    fn required_f64(&self, column: Column) -> Result<f64, ParseError> {
        let raw = self.cell(column).unwrap_or_default();
        raw.parse::<f64>().map_err(|_| self.invalid(column, raw))
    }

    fn optional<T>(
        &self,
        column: Column,
        raw: Option<&str>,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, ParseError> {
        match raw {
            None | Some("") => Ok(None),
            Some(raw) => parse(raw).map(Some).ok_or_else(|| self.invalid(column, raw)),
        }
    }

    fn invalid(&self, column: Column, value: &str) -> ParseError {
        ParseError::InvalidField {
            path: self.path.to_path_buf(),
            line: self.line,
            column: column.name(),
            value: value.to_string(),
        }
    }
}

/// Trade counts are integers, but some writers emit them as `12.0`.
fn parse_count(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().or_else(|| {
        let value = raw.parse::<f64>().ok()?;
        (value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64).then_some(value as u64)
    })
}

fn csv_error(path: &Path, err: &csv::Error) -> ParseError {
    if let csv::ErrorKind::Io(io) = err.kind() {
        return ParseError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(io.kind(), io.to_string()),
        };
    }
    ParseError::Malformed {
        path: path.to_path_buf(),
        line: err.position().map_or(0, csv::Position::line),
        reason: err.to_string(),
    }
}
