//! Concurrent per-pair snapshot download.

use chrono::{DateTime, DurationRound, NaiveDateTime, TimeDelta, Utc};
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use ohlcvault_types::OhlcRow;
use tracing::{debug, warn};

use crate::KrakenClient;

/// Hours of one-minute history requested per run.
///
/// Kraken serves roughly the last 720 one-minute bars.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 12;

/// Returns the `since` argument for a lookback of `hours` before `now`.
#[must_use]
pub fn lookback_start(now: i64, hours: i64) -> i64 {
    now - hours * 3600
}

/// The bars downloaded for one pair in one run.
#[derive(Debug, Clone)]
pub struct PairSnapshot {
    /// The requested pair name.
    pub pair: String,
    /// When the run started.
    pub captured_at: DateTime<Utc>,
    /// Downloaded rows, oldest first.
    pub rows: Vec<OhlcRow>,
}

impl PairSnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(pair: impl Into<String>, captured_at: DateTime<Utc>, rows: Vec<OhlcRow>) -> Self {
        Self {
            pair: pair.into(),
            captured_at,
            rows,
        }
    }

    /// Returns true if no bars were downloaded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of bars.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns the timestamp used in the snapshot's file name: the capture
    /// time truncated to the hour.
    #[must_use]
    pub fn file_stamp(&self) -> NaiveDateTime {
        self.captured_at
            .duration_trunc(TimeDelta::hours(1))
            .unwrap_or(self.captured_at)
            .naive_utc()
    }
}

/// Creates a stream of snapshots, one per pair, downloaded concurrently.
///
/// A pair whose download fails is logged and left out of the stream; it
/// never ends the stream early.
pub fn fetch_snapshots(
    client: &KrakenClient,
    pairs: Vec<String>,
    since: i64,
) -> impl Stream<Item = PairSnapshot> + '_ {
    let captured_at = Utc::now();
    let concurrency = client.config().concurrency.max(1);

    stream::iter(pairs)
        .map(move |pair| async move {
            match client.ohlc(&pair, since).await {
                Ok(rows) => {
                    debug!(pair = %pair, rows = rows.len(), "downloaded");
                    Some(PairSnapshot::new(pair, captured_at, rows))
                }
                Err(e) => {
                    warn!(pair = %pair, error = %e, "skipping pair");
                    None
                }
            }
        })
        .buffer_unordered(concurrency)
        .filter_map(future::ready)
}
