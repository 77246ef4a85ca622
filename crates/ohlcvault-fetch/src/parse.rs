//! Decoding of Kraken response bodies.
//!
//! Every public endpoint wraps its payload as `{"error": [...], "result": ...}`.
//! OHLC bars arrive as arrays of
//! `[time, open, high, low, close, vwap, volume, count]`, with prices and
//! volumes encoded as decimal strings.

use chrono::DateTime;
use ohlcvault_types::OhlcRow;
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::FetchError;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ServerTime {
    unixtime: i64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Decimal {
    Text(String),
    Number(f64),
}

impl Decimal {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Text(s) => s.trim().parse().ok(),
            Self::Number(n) => Some(*n),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBar(i64, Decimal, Decimal, Decimal, Decimal, Decimal, Decimal, u64);

fn decode_error(endpoint: &str, message: impl Into<String>) -> FetchError {
    FetchError::Decode {
        endpoint: endpoint.to_string(),
        message: message.into(),
    }
}

fn unwrap_envelope<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, FetchError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| decode_error(endpoint, e.to_string()))?;

    if !envelope.error.is_empty() {
        return Err(FetchError::Api {
            endpoint: endpoint.to_string(),
            messages: envelope.error,
        });
    }
    envelope
        .result
        .ok_or_else(|| decode_error(endpoint, "missing result"))
}

/// Extracts the server time in unix seconds.
///
/// # Errors
///
/// Returns [`FetchError::Api`] or [`FetchError::Decode`].
pub fn parse_server_time(endpoint: &str, body: &str) -> Result<i64, FetchError> {
    unwrap_envelope::<ServerTime>(endpoint, body).map(|t| t.unixtime)
}

/// Extracts the sorted list of pair names.
///
/// # Errors
///
/// Returns [`FetchError::Api`] or [`FetchError::Decode`].
pub fn parse_asset_pairs(endpoint: &str, body: &str) -> Result<Vec<String>, FetchError> {
    let pairs: BTreeMap<String, IgnoredAny> = unwrap_envelope(endpoint, body)?;
    Ok(pairs.into_keys().collect())
}

/// Decodes the bars of one OHLC response into rows for `pair`.
///
/// Kraken may key the result by its canonical pair name rather than the
/// requested one; when the requested key is absent the single non-`last`
/// entry is used. Rows always carry the requested name.
///
/// # Errors
///
/// Returns [`FetchError::Api`] or [`FetchError::Decode`].
pub fn parse_ohlc(endpoint: &str, pair: &str, body: &str) -> Result<Vec<OhlcRow>, FetchError> {
    let mut result: BTreeMap<String, Value> = unwrap_envelope(endpoint, body)?;

    let bars = match result.remove(pair) {
        Some(bars) => bars,
        None => {
            let mut series = result.into_iter().filter(|(key, _)| key != "last");
            match (series.next(), series.next()) {
                (Some((_, bars)), None) => bars,
                _ => return Err(decode_error(endpoint, format!("no bars for pair '{pair}'"))),
            }
        }
    };

    let bars: Vec<RawBar> =
        serde_json::from_value(bars).map_err(|e| decode_error(endpoint, e.to_string()))?;
    bars.into_iter()
        .map(|bar| {
            to_row(pair, &bar)
                .ok_or_else(|| decode_error(endpoint, format!("unreadable bar at {}", bar.0)))
        })
        .collect()
}

fn to_row(pair: &str, bar: &RawBar) -> Option<OhlcRow> {
    let RawBar(time, open, high, low, close, vwap, volume, count) = bar;
    let row = OhlcRow::new(
        pair,
        DateTime::from_timestamp(*time, 0)?,
        open.value()?,
        high.value()?,
        low.value()?,
        close.value()?,
        volume.value()?,
    );
    Some(row.with_vwap(vwap.value()?).with_trade_count(*count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    const OHLC_BODY: &str = r#"{
        "error": [],
        "result": {
            "XETHZEUR": [
                [1704448800, "2050.10", "2051.00", "2049.50", "2050.70", "2050.33", "3.51200000", 14],
                [1704448860, "2050.70", "2052.00", "2050.70", "2051.90", "2051.20", "0.80000000", 3]
            ],
            "last": 1704448800
        }
    }"#;

    #[test]
    fn test_parse_ohlc() {
        let rows = parse_ohlc("OHLC", "XETHZEUR", OHLC_BODY).unwrap();

        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(first.pair, "XETHZEUR");
        assert_eq!(
            first.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap()
        );
        assert_relative_eq!(first.open, 2050.10);
        assert_relative_eq!(first.vwap.unwrap(), 2050.33);
        assert_relative_eq!(first.volume, 3.512);
        assert_eq!(first.trade_count, Some(14));
    }

    #[test]
    fn test_parse_ohlc_canonical_key() {
        let rows = parse_ohlc("OHLC", "ETHEUR", OHLC_BODY).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.pair == "ETHEUR"));
    }

    #[test]
    fn test_parse_ohlc_api_error() {
        let body = r#"{"error": ["EQuery:Unknown asset pair"]}"#;
        let err = parse_ohlc("OHLC", "NOPE", body).unwrap_err();
        assert!(matches!(err, FetchError::Api { messages, .. } if messages.len() == 1));
    }

    #[test]
    fn test_parse_ohlc_bad_price() {
        let body = r#"{"error": [], "result": {"X": [[1, "abc", "1", "1", "1", "1", "1", 1]], "last": 1}}"#;
        assert!(matches!(
            parse_ohlc("OHLC", "X", body),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn test_parse_server_time() {
        let body = r#"{"error": [], "result": {"unixtime": 1704448800, "rfc1123": "Fri, 05 Jan 24 10:00:00 +0000"}}"#;
        assert_eq!(parse_server_time("Time", body).unwrap(), 1_704_448_800);
        assert!(parse_server_time("Time", "not json").is_err());
    }

    #[test]
    fn test_parse_asset_pairs() {
        let body = r#"{"error": [], "result": {"XXBTZUSD": {"altname": "XBTUSD"}, "AAVEEUR": {}}}"#;
        assert_eq!(
            parse_asset_pairs("AssetPairs", body).unwrap(),
            vec!["AAVEEUR".to_string(), "XXBTZUSD".to_string()]
        );
    }
}
