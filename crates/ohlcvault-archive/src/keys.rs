//! Compact index of the `(pair, timestamp)` keys already in a partition.

use arrow::array::{Array, RecordBatch};
use ohlcvault_format::{FormatError, parquet::key_columns};
use ohlcvault_types::{OhlcRow, RowKey};
use std::collections::{HashMap, HashSet};

/// Sorted microsecond timestamps per pair.
///
/// Costs roughly eight bytes per key plus one entry per distinct pair.
#[derive(Debug, Default)]
pub struct KeyIndex {
    keys: HashMap<String, Vec<i64>>,
    len: usize,
}

impl KeyIndex {
    /// Starts building an index.
    #[must_use]
    pub fn builder() -> KeyIndexBuilder {
        KeyIndexBuilder::default()
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains(&self, key: RowKey<'_>) -> bool {
        self.keys
            .get(key.pair)
            .is_some_and(|micros| micros.binary_search(&key.micros).is_ok())
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the index holds no keys.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Splits incoming rows into new rows and a duplicate count.
    ///
    /// A row is a duplicate if its key is indexed or appeared earlier in
    /// `rows`; the first occurrence wins. Order of the kept rows is preserved.
    #[must_use]
    pub fn split_new(&self, rows: Vec<OhlcRow>) -> (Vec<OhlcRow>, usize) {
        let keep: Vec<bool> = {
            let mut seen: HashSet<RowKey<'_>> = HashSet::with_capacity(rows.len());
            rows.iter()
                .map(|row| {
                    let key = row.key();
                    !self.contains(key) && seen.insert(key)
                })
                .collect()
        };

        let mut fresh = Vec::with_capacity(keep.iter().filter(|k| **k).count());
        let mut duplicates = 0;
        for (row, keep) in rows.into_iter().zip(keep) {
            if keep {
                fresh.push(row);
            } else {
                duplicates += 1;
            }
        }
        (fresh, duplicates)
    }
}

/// Accumulates keys before sorting them into a [`KeyIndex`].
#[derive(Debug, Default)]
pub struct KeyIndexBuilder {
    keys: HashMap<String, Vec<i64>>,
}

impl KeyIndexBuilder {
    /// Adds one key.
    pub fn push(&mut self, pair: &str, micros: i64) {
        if let Some(entries) = self.keys.get_mut(pair) {
            entries.push(micros);
        } else {
            self.keys.insert(pair.to_string(), vec![micros]);
        }
    }

    /// Adds every key of a batch holding at least the key columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch lacks the key columns.
    pub fn push_batch(&mut self, batch: &RecordBatch) -> Result<(), FormatError> {
        let (pairs, timestamps) = key_columns(batch)?;
        for i in 0..batch.num_rows() {
            if pairs.is_valid(i) && timestamps.is_valid(i) {
                self.push(pairs.value(i), timestamps.value(i));
            }
        }
        Ok(())
    }

    /// Sorts and deduplicates the keys.
    #[must_use]
    pub fn build(mut self) -> KeyIndex {
        let mut len = 0;
        for micros in self.keys.values_mut() {
            micros.sort_unstable();
            micros.dedup();
            micros.shrink_to_fit();
            len += micros.len();
        }
        KeyIndex {
            keys: self.keys,
            len,
        }
    }
}
