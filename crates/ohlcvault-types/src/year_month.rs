//! Calendar month used as the archive partition key.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::YearMonthError;

/// A `(year, month)` pair identifying one archive partition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Creates a new year/month, validating the month number.
    ///
    /// # Errors
    ///
    /// Returns an error if `month` is not in `1..=12` or the year is outside
    /// the four-digit range used in file names.
    pub const fn new(year: i32, month: u32) -> Result<Self, YearMonthError> {
        if month < 1 || month > 12 {
            return Err(YearMonthError::InvalidMonth(month));
        }
        if year < 0 || year > 9999 {
            return Err(YearMonthError::InvalidYear(year));
        }
        Ok(Self { year, month })
    }

    /// Returns the partition containing the given instant.
    #[must_use]
    pub fn from_datetime(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    /// Returns the year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Returns the month (1-12).
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Returns the year as a four-digit directory name.
    #[must_use]
    pub fn year_dir(&self) -> String {
        format!("{:04}", self.year)
    }

    /// Returns the month as a two-digit directory name.
    #[must_use]
    pub fn month_dir(&self) -> String {
        format!("{:02}", self.month)
    }

    /// Returns the following month.
    #[must_use]
    pub const fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Returns true if the instant falls inside this month.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        Self::from_datetime(ts) == *self
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
