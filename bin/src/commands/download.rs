//! Kraken snapshot download.

use anyhow::{Context, Result};
use futures::StreamExt;
use ohlcvault_lib::prelude::*;
use ohlcvault_lib::{DEFAULT_LOOKBACK_HOURS, lookback_start};
use std::pin::pin;
use tracing::{info, warn};

use crate::display::progress_bar;

/// Downloads the last hours of one-minute bars for the configured pairs (all
/// tradable pairs when none are configured) into the source tree.
///
/// Returns 2 if any pair could not be stored, 0 otherwise.
pub(crate) async fn download(config: &ArchiveConfig, quiet: bool) -> Result<u8> {
    let client = KrakenClient::with_defaults().context("Failed to create HTTP client")?;

    let now = client
        .server_time()
        .await
        .context("Failed to query Kraken server time")?;
    let since = lookback_start(now, DEFAULT_LOOKBACK_HOURS);

    let pairs = if config.pairs.is_empty() {
        client
            .asset_pairs()
            .await
            .context("Failed to list Kraken asset pairs")?
    } else {
        config.pairs.clone()
    };
    let requested = pairs.len();
    info!(pairs = requested, since, "downloading snapshots");

    let progress = progress_bar(requested as u64, "pairs", quiet);
    let writer = SnapshotWriter::new(&config.input);
    let mut snapshots = pin!(fetch_snapshots(&client, pairs, since));
    let (mut written, mut failed) = (0usize, 0usize);

    while let Some(snapshot) = snapshots.next().await {
        progress.set_message(snapshot.pair.clone());
        let writer = writer.clone();
        let stored = tokio::task::spawn_blocking(move || writer.write(&snapshot))
            .await
            .context("Snapshot writer panicked")?;
        match stored {
            Ok(Some(_)) => written += 1,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "failed to store snapshot");
                failed += 1;
            }
        }
        progress.inc(1);
    }

    progress.finish_with_message(format!("{written} snapshots written"));
    info!(requested, written, failed, "download finished");
    Ok(if failed > 0 { 2 } else { 0 })
}
