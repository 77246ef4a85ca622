//! Kraken public endpoint construction.

/// Base URL of the Kraken public REST API.
pub const BASE_URL: &str = "https://api.kraken.com/0/public";

/// One-minute bars.
pub const ONE_MINUTE: u32 = 1;

/// Builds the server time URL.
#[must_use]
pub fn time_url() -> String {
    format!("{BASE_URL}/Time")
}

/// Builds the tradable asset pairs URL.
#[must_use]
pub fn asset_pairs_url() -> String {
    format!("{BASE_URL}/AssetPairs")
}

/// Builds the OHLC URL for `pair`, returning bars newer than `since`.
///
/// # Example
///
/// ```
/// use ohlcvault_fetch::url::ohlc_url;
///
/// let url = ohlc_url("XETHZEUR", 1_704_448_800);
/// assert_eq!(url, "https://api.kraken.com/0/public/OHLC?pair=XETHZEUR&interval=1&since=1704448800");
/// ```
#[must_use]
pub fn ohlc_url(pair: &str, since: i64) -> String {
    format!("{BASE_URL}/OHLC?pair={pair}&interval={ONE_MINUTE}&since={since}")
}
