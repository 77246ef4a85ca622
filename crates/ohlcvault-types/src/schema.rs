//! The fixed OHLC row schema shared by source CSVs and archive partitions.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::SchemaError;

/// A logical column of the OHLC row schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Interval start time.
    Timestamp,
    /// Opening price.
    Open,
    /// Highest price.
    High,
    /// Lowest price.
    Low,
    /// Closing price.
    Close,
    /// Volume-weighted average price.
    Vwap,
    /// Traded volume.
    Volume,
    /// Number of trades.
    TradeCount,
    /// Trading pair.
    Pair,
}

impl Column {
    /// Returns the canonical column name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Vwap => "vwap",
            Self::Volume => "volume",
            Self::TradeCount => "trade_count",
            Self::Pair => "pair",
        }
    }

    /// Returns true if every source file must carry this column.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(
            self,
            Self::Timestamp | Self::Open | Self::High | Self::Low | Self::Close | Self::Volume
        )
    }

    /// Resolves a header cell (canonical name or alias), case-insensitively.
    #[must_use]
    pub fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_lowercase().as_str() {
            "timestamp" | "time" => Some(Self::Timestamp),
            "open" => Some(Self::Open),
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            "close" => Some(Self::Close),
            "vwap" => Some(Self::Vwap),
            "volume" => Some(Self::Volume),
            "trade_count" | "count" => Some(Self::TradeCount),
            "pair" => Some(Self::Pair),
            _ => None,
        }
    }

    /// Returns all columns in canonical CSV order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Timestamp,
            Self::Open,
            Self::High,
            Self::Low,
            Self::Close,
            Self::Vwap,
            Self::Volume,
            Self::TradeCount,
            Self::Pair,
        ]
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Legacy header cell produced by a downloader that dropped a comma between
/// `count` and `pair`.
pub const LEGACY_COUNTPAIR: &str = "countpair";

/// Splits a legacy `countpair` cell such as `3AAVEEUR` into its leading
/// digits and the pair that follows.
///
/// Returns `None` unless both parts are non-empty.
#[must_use]
pub fn split_countpair(cell: &str) -> Option<(&str, &str)> {
    let cell = cell.trim();
    let digits = cell.bytes().take_while(u8::is_ascii_digit).count();
    let (count, pair) = cell.split_at(digits);
    (!count.is_empty() && !pair.is_empty()).then_some((count, pair))
}

/// Mapping from logical columns to field positions in one CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    slots: [Option<usize>; 9],
    field_count: usize,
    countpair: Option<usize>,
}

impl ColumnMap {
    /// Returns the field index of a column, if present.
    ///
    /// Always `None` for `trade_count` and `pair` when the header ends in a
    /// legacy `countpair` cell; see [`countpair`](Self::countpair).
    #[must_use]
    pub const fn get(&self, column: Column) -> Option<usize> {
        self.slots[column.slot()]
    }

    /// Returns the number of header fields.
    #[must_use]
    pub const fn field_count(&self) -> usize {
        self.field_count
    }

    /// Returns the field index of a trailing legacy `countpair` cell.
    #[must_use]
    pub const fn countpair(&self) -> Option<usize> {
        self.countpair
    }

    /// Returns true if a record with `len` fields fits this header.
    ///
    /// With a `countpair` header, records may carry the joined cell
    /// (`...,3AAVEEUR`) or one extra field (`...,3,AAVEEUR`).
    #[must_use]
    pub const fn accepts(&self, len: usize) -> bool {
        len == self.field_count || (self.countpair.is_some() && len == self.field_count + 1)
    }
}

/// The fixed OHLC row schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowSchema;

impl RowSchema {
    /// Header written by this crate's own CSV snapshots.
    pub const CSV_HEADER: &'static [&'static str] = &[
        "timestamp",
        "open",
        "high",
        "low",
        "close",
        "vwap",
        "volume",
        "trade_count",
        "pair",
    ];

    /// Validates a header row and maps its cells to columns.
    ///
    /// Unknown and duplicate columns are rejected, as is any missing required
    /// column. A trailing `countpair` cell is accepted and stands for
    /// `trade_count` followed by `pair`.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first header problem found.
    pub fn resolve<'a, I>(headers: I) -> Result<ColumnMap, SchemaError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let headers: Vec<&str> = headers.into_iter().collect();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(SchemaError::EmptyHeader);
        }

        let mut slots: [Option<usize>; 9] = [None; 9];
        let mut countpair = None;

        for (idx, raw) in headers.iter().enumerate() {
            let is_last = idx + 1 == headers.len();
            if is_last && raw.trim().eq_ignore_ascii_case(LEGACY_COUNTPAIR) {
                for column in [Column::TradeCount, Column::Pair] {
                    if slots[column.slot()].is_some() {
                        return Err(SchemaError::DuplicateColumn(column.name()));
                    }
                }
                countpair = Some(idx);
                continue;
            }

            let column = Column::from_header(raw)
                .ok_or_else(|| SchemaError::UnknownColumn(raw.trim().to_string()))?;
            if slots[column.slot()].replace(idx).is_some() {
                return Err(SchemaError::DuplicateColumn(column.name()));
            }
        }

        if let Some(missing) = Column::all()
            .iter()
            .find(|c| c.is_required() && slots[c.slot()].is_none())
        {
            return Err(SchemaError::MissingColumn(missing.name()));
        }

        Ok(ColumnMap {
            slots,
            field_count: headers.len(),
            countpair,
        })
    }
}

/// Parses a source timestamp cell as UTC.
///
/// Accepted forms: `%Y-%m-%d %H:%M`, `%Y-%m-%d %H:%M:%S`, the same with a
/// `T` separator, RFC 3339, and integer Unix seconds.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(secs) = value.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
