//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the HTTP client with a proper user agent string
//! - GET requests gated by the run's concurrency limit
//! - Retry with exponential backoff for transient failures
//! - Cooperative cancellation before every attempt
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::gate::ConcurrencyGate;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Transient network failure of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// The page was fetched with status 200
    Success {
        /// Page body content
        body: String,
        /// Attempts made, including the successful one
        attempts: u32,
    },

    /// Every attempt failed; the URL belongs in the failed set
    Exhausted {
        /// Failure of the last attempt
        error: FetchError,
        /// Attempts made (initial + retries)
        attempts: u32,
    },

    /// Shutdown was requested before the next attempt
    Cancelled,
}

/// Bounded retry schedule with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt
    pub max_retries: u32,

    /// Delay before the first retry; doubles for each further retry
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.backoff_base))
    }

    /// Delay before retry number `retry` (0-based): `backoff_base * 2^retry`
    ///
    /// Saturates instead of overflowing.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    /// Maximum number of attempts for one URL
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages with gating, retry and cancellation
///
/// Cloning is cheap; clones share the client, the gate and the token.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    gate: ConcurrencyGate,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(
        client: Client,
        gate: ConcurrencyGate,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            gate,
            retry,
            cancel,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Whether shutdown has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 200 | Success |
    /// | Any other status | Retry after backoff |
    /// | Timeout | Retry after backoff |
    /// | Transport error | Retry after backoff |
    /// | Retries exhausted | Exhausted |
    /// | Shutdown requested | Cancelled, no network call |
    ///
    /// A permit from the concurrency gate is held only while a request is
    /// on the wire, never during the backoff sleep.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let mut retry = 0;

        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!("Skipping fetch of {}: shutdown requested", url);
                return FetchResult::Cancelled;
            }

            let outcome = {
                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    permit = self.gate.acquire() => permit,
                };
                let Some(_permit) = permit else {
                    tracing::debug!("Gave up waiting for a permit for {}", url);
                    return FetchResult::Cancelled;
                };
                self.attempt(url).await
            };

            let attempts = retry + 1;
            match outcome {
                Ok(body) => {
                    tracing::info!("Successfully fetched {} (attempt {})", url, attempts);
                    return FetchResult::Success { body, attempts };
                }
                Err(error) if retry < self.retry.max_retries => {
                    let delay = self.retry.delay_before_retry(retry);
                    tracing::warn!(
                        "Fetch of {} failed ({}), retrying in {:?} ({}/{})",
                        url,
                        error,
                        delay,
                        retry + 1,
                        self.retry.max_retries
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {
                            tracing::debug!("Backoff for {} interrupted by shutdown", url);
                            return FetchResult::Cancelled;
                        }
                    }
                    retry += 1;
                }
                Err(error) => {
                    tracing::error!(
                        "Giving up on {} after {} attempts: {}",
                        url,
                        attempts,
                        error
                    );
                    return FetchResult::Exhausted { error, attempts };
                }
            }
        }
    }

    /// Performs a single GET
    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}
