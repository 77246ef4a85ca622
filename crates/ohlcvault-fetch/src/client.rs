//! HTTP client for the Kraken public API.

use ohlcvault_format::FormatError;
use ohlcvault_types::OhlcRow;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::{parse, url};

/// Configuration for the Kraken client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum concurrent requests.
    pub concurrency: usize,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for failed requests.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds).
    pub max_delay_ms: u64,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            concurrency: 4, // Public endpoints are rate limited per IP
            timeout: Duration::from_secs(30),
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            user_agent: format!("ohlcvault/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Errors that can occur while fetching or storing snapshots.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error status.
    #[error("Server error: {status}")]
    ServerError {
        /// HTTP status code.
        status: u16,
    },

    /// Kraken answered with a non-empty error list.
    #[error("Kraken API error from {endpoint}: {}", messages.join("; "))]
    Api {
        /// Endpoint that failed.
        endpoint: String,
        /// Error strings reported by Kraken.
        messages: Vec<String>,
    },

    /// The response body did not have the expected shape.
    #[error("Unexpected response from {endpoint}: {message}")]
    Decode {
        /// Endpoint that produced the body.
        endpoint: String,
        /// What was wrong with it.
        message: String,
    },

    /// A pair name cannot be used in a source file name.
    #[error("Pair '{0}' cannot be used in a snapshot file name")]
    InvalidPair(String),

    /// Writing a snapshot file failed.
    #[error("Failed to write snapshot '{path}': {source}")]
    Write {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Rendering a snapshot as CSV failed.
    #[error("Failed to render snapshot '{path}': {source}")]
    Format {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying format error.
        #[source]
        source: FormatError,
    },
}

/// Kraken REST client with connection pooling and retry logic.
#[derive(Debug, Clone)]
pub struct KrakenClient {
    client: Client,
    config: ClientConfig,
}

impl KrakenClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.concurrency)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// Creates a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, reqwest::Error> {
        Self::new(ClientConfig::default())
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the exchange's current time as unix seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn server_time(&self) -> Result<i64, FetchError> {
        let endpoint = url::time_url();
        let body = self.get_text(&endpoint).await?;
        parse::parse_server_time(&endpoint, &body)
    }

    /// Lists every tradable pair, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn asset_pairs(&self) -> Result<Vec<String>, FetchError> {
        let endpoint = url::asset_pairs_url();
        let body = self.get_text(&endpoint).await?;
        parse::parse_asset_pairs(&endpoint, &body)
    }

    /// Downloads the one-minute bars of `pair` newer than `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn ohlc(&self, pair: &str, since: i64) -> Result<Vec<OhlcRow>, FetchError> {
        let endpoint = url::ohlc_url(pair, since);
        let body = self.get_text(&endpoint).await?;
        parse::parse_ohlc(&endpoint, pair, &body)
    }

    /// Performs a GET, retrying transient failures.
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let mut attempts = 0;

        loop {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    {
                        if attempts < self.config.max_retries {
                            attempts += 1;
                            let delay = self.calculate_backoff_delay(attempts);
                            debug!(url, status = status.as_u16(), attempt = attempts, "retrying");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(FetchError::ServerError {
                            status: status.as_u16(),
                        });
                    }

                    response.error_for_status_ref()?;
                    return Ok(response.text().await?);
                }
                Err(e) if Self::is_retryable_error(&e) && attempts < self.config.max_retries => {
                    attempts += 1;
                    let delay = self.calculate_backoff_delay(attempts);
                    debug!(url, error = %e, attempt = attempts, "retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Calculates the backoff delay with exponential backoff and jitter.
    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let exp_delay = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(10));
        let capped_delay = exp_delay.min(self.config.max_delay_ms);

        // Deterministic jitter within ±25%
        let jitter_range = capped_delay / 4;
        let jitter = if jitter_range > 0 {
            (u64::from(attempt) * 17 % (jitter_range * 2)) as i64 - jitter_range as i64
        } else {
            0
        };

        Duration::from_millis((capped_delay as i64 + jitter).max(100) as u64)
    }

    fn is_retryable_error(error: &reqwest::Error) -> bool {
        if error.is_builder() {
            return false;
        }
        error.is_timeout() || error.is_connect() || error.is_request()
    }
}
