//! CSV snapshot output format.

use ohlcvault_types::{OhlcRow, RowSchema};
use std::io::Write;

use crate::{FormatError, Formatter};

/// Timestamp format written to snapshot files.
pub const SNAPSHOT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// CSV formatter producing files the source reader accepts.
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    /// Field delimiter (default: comma).
    delimiter: char,
    /// Whether to include header row.
    include_header: bool,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvFormatter {
    /// Creates a new CSV formatter with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
        }
    }

    /// Sets the field delimiter.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether to include a header row.
    #[must_use]
    pub const fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }
}

impl Formatter for CsvFormatter {
    fn write_rows<W: Write + Send>(
        &self,
        rows: &[OhlcRow],
        mut writer: W,
    ) -> Result<(), FormatError> {
        let d = self.delimiter;

        if self.include_header {
            writeln!(writer, "{}", RowSchema::CSV_HEADER.join(d.to_string().as_str()))?;
        }

        for row in rows {
            let vwap = row.vwap.map(|v| v.to_string()).unwrap_or_default();
            let count = row.trade_count.map(|c| c.to_string()).unwrap_or_default();
            writeln!(
                writer,
                "{}{d}{}{d}{}{d}{}{d}{}{d}{vwap}{d}{}{d}{count}{d}{}",
                row.timestamp.format(SNAPSHOT_TIME_FORMAT),
                row.open,
                row.high,
                row.low,
                row.close,
                row.volume,
                row.pair
            )?;
        }

        writer.flush()?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "csv"
    }
}
