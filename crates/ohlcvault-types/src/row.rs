//! OHLC row representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::YearMonth;

/// A single OHLC observation for one trading pair and one interval.
///
/// Price sanity (`low <= open, close <= high`) is deliberately not checked:
/// upstream data is archived as delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcRow {
    /// Trading pair identifier (e.g. "XETHZEUR").
    pub pair: String,
    /// Interval start time (UTC).
    pub timestamp: DateTime<Utc>,
    /// Opening price.
    pub open: f64,
    /// Highest price during the interval.
    pub high: f64,
    /// Lowest price during the interval.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Volume-weighted average price, when the source provides it.
    pub vwap: Option<f64>,
    /// Traded volume.
    pub volume: f64,
    /// Number of trades in the interval, when the source provides it.
    pub trade_count: Option<u64>,
}

impl OhlcRow {
    /// Creates a new row without the optional fields.
    #[must_use]
    pub fn new(
        pair: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            pair: pair.into(),
            timestamp,
            open,
            high,
            low,
            close,
            vwap: None,
            volume,
            trade_count: None,
        }
    }

    /// Sets the volume-weighted average price.
    #[must_use]
    pub const fn with_vwap(mut self, vwap: f64) -> Self {
        self.vwap = Some(vwap);
        self
    }

    /// Sets the trade count.
    #[must_use]
    pub const fn with_trade_count(mut self, count: u64) -> Self {
        self.trade_count = Some(count);
        self
    }

    /// Returns the natural key used for deduplication.
    #[must_use]
    pub fn key(&self) -> RowKey<'_> {
        RowKey {
            pair: &self.pair,
            micros: self.timestamp.timestamp_micros(),
        }
    }

    /// Returns the archive partition this row belongs to.
    #[must_use]
    pub fn year_month(&self) -> YearMonth {
        YearMonth::from_datetime(self.timestamp)
    }
}

/// Borrowed natural key of a row: `(pair, timestamp)`.
///
/// The timestamp is held as microseconds since the epoch, the same unit the
/// archive stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey<'a> {
    /// Trading pair.
    pub pair: &'a str,
    /// Timestamp in microseconds since the Unix epoch.
    pub micros: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn create_test_row() -> OhlcRow {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap();
        OhlcRow::new("XETHZEUR", timestamp, 2100.5, 2101.0, 2099.9, 2100.7, 3.25)
    }

    #[test]
    fn test_row_key() {
        let row = create_test_row();
        let key = row.key();

        assert_eq!(key.pair, "XETHZEUR");
        assert_eq!(key.micros, row.timestamp.timestamp_micros());
    }

    #[test]
    fn test_row_year_month() {
        let row = create_test_row();
        assert_eq!(row.year_month(), YearMonth::new(2024, 1).unwrap());
    }

    #[test]
    fn test_optional_fields() {
        let row = create_test_row().with_vwap(2100.4).with_trade_count(17);

        assert_relative_eq!(row.vwap.unwrap(), 2100.4);
        assert_eq!(row.trade_count, Some(17));
    }

    #[test]
    fn test_keys_order_by_pair_then_time() {
        let a = RowKey {
            pair: "XBTEUR",
            micros: 10,
        };
        let b = RowKey {
            pair: "XBTEUR",
            micros: 20,
        };
        let c = RowKey {
            pair: "XETHZEUR",
            micros: 0,
        };

        assert!(a < b);
        assert!(b < c);
    }
}
