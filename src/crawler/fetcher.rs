//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building a pooled HTTP client with browser-like headers
//! - Retry logic with exponential backoff for transient failures
//! - Escalating fixed waits when the site signals throttling
//! - The `Transport` seam the scheduler fetches through

use crate::config::HttpConfig;
use crate::{ConfigError, HarvestError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Result of a fetch operation
///
/// Failures are values: the caller logs them and treats the URL as having
/// no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// Every attempt ended in a throttling response
    Throttled {
        /// The last throttling status received
        status_code: u16,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// The last attempt returned a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// The last attempt failed below HTTP (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
        /// Attempts made before giving up
        attempts: u32,
    },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Consumes the result, returning the body on success
    pub fn into_body(self) -> Option<String> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Short description of a failure for log lines
    pub fn describe(&self) -> String {
        match self {
            Self::Success { status_code, .. } => format!("HTTP {}", status_code),
            Self::Throttled {
                status_code,
                attempts,
            } => format!("throttled with HTTP {} after {} attempts", status_code, attempts),
            Self::HttpError {
                status_code,
                attempts,
            } => format!("HTTP {} after {} attempts", status_code, attempts),
            Self::NetworkError { error, attempts } => {
                format!("{} after {} attempts", error, attempts)
            }
        }
    }
}

/// Fetches one URL, retrying internally
///
/// Implementations must be shareable across concurrently running fetch
/// tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url`, returning the body or the reason there is none
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Attempt bound and waits between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Unit of the exponential backoff for generic failures
    pub base_delay: Duration,
    /// Escalating waits after throttling responses; the last entry repeats
    pub throttle_schedule: Vec<Duration>,
    /// Statuses treated as throttling signals
    pub throttle_statuses: Vec<u16>,
}

impl RetryPolicy {
    /// Builds the policy from the HTTP configuration
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay),
            throttle_schedule: config
                .throttle_backoff
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            throttle_statuses: config.throttle_statuses.clone(),
        }
    }

    /// Wait after a generic failure on zero-based `attempt`: `base * 2^attempt`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Wait after a throttling response on zero-based `attempt`
    ///
    /// Attempts past the end of the schedule reuse its last entry.
    pub fn throttle_delay(&self, attempt: u32) -> Duration {
        let index = (attempt as usize).min(self.throttle_schedule.len().saturating_sub(1));
        self.throttle_schedule
            .get(index)
            .copied()
            .unwrap_or(self.base_delay)
    }

    pub fn is_throttle(&self, status: u16) -> bool {
        self.throttle_statuses.contains(&status)
    }

    /// True when another attempt follows zero-based `attempt`
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

/// Builds an HTTP client with proper configuration
///
/// Every request carries the configured user agent, `Accept: */*`,
/// `X-Requested-With: XMLHttpRequest` and the site root as `Referer`; the
/// detail pages are served as AJAX fragments.
///
/// # Arguments
///
/// * `config` - The HTTP configuration
/// * `base_url` - Root of the target site, sent as the referer
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - A header value was invalid or the client failed to build
pub fn build_http_client(config: &HttpConfig, base_url: &str) -> crate::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
    headers.insert(
        REFERER,
        HeaderValue::from_str(base_url).map_err(|e| {
            HarvestError::Config(ConfigError::InvalidUrl(format!(
                "base-url '{}' is not a valid header value: {}",
                base_url, e
            )))
        })?,
    );

    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .pool_max_idle_per_host(config.pool_size)
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// `Transport` over a pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    policy: RetryPolicy,
}

impl HttpTransport {
    /// Creates a transport from the HTTP configuration
    pub fn new(config: &HttpConfig, base_url: &str) -> crate::Result<Self> {
        Ok(Self {
            client: build_http_client(config, base_url)?,
            policy: RetryPolicy::from_config(config),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    /// Fetches a URL with the retry policy
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Return the body |
    /// | Throttling status (405, 429 by default) | Wait `throttle_schedule[attempt]`, retry |
    /// | Other non-2xx | Wait `base * 2^attempt`, retry |
    /// | Timeout / connection error | Wait `base * 2^attempt`, retry |
    ///
    /// No wait follows the last attempt.
    async fn fetch(&self, url: &str) -> FetchResult {
        let policy = &self.policy;
        let mut outcome = FetchResult::NetworkError {
            error: "no attempt made".to_string(),
            attempts: 0,
        };

        for attempt in 0..policy.max_attempts {
            let attempts = attempt + 1;
            debug!(url, attempt = attempts, "Fetching");

            let delay = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let status_code = status.as_u16();

                    if policy.is_throttle(status_code) {
                        let delay = policy.throttle_delay(attempt);
                        warn!(
                            url,
                            status = status_code,
                            attempt = attempts,
                            max_attempts = policy.max_attempts,
                            wait_secs = delay.as_secs_f64(),
                            "Site is throttling requests"
                        );
                        outcome = FetchResult::Throttled {
                            status_code,
                            attempts,
                        };
                        delay
                    } else if !status.is_success() {
                        warn!(
                            url,
                            status = status_code,
                            attempt = attempts,
                            "HTTP error response"
                        );
                        outcome = FetchResult::HttpError {
                            status_code,
                            attempts,
                        };
                        policy.backoff_for(attempt)
                    } else {
                        let final_url = response.url().to_string();
                        match response.text().await {
                            Ok(body) => {
                                return FetchResult::Success {
                                    final_url,
                                    status_code,
                                    body,
                                }
                            }
                            Err(e) => {
                                warn!(url, attempt = attempts, error = %e, "Failed to read body");
                                outcome = FetchResult::NetworkError {
                                    error: e.to_string(),
                                    attempts,
                                };
                                policy.backoff_for(attempt)
                            }
                        }
                    }
                }
                Err(e) => {
                    let error = classify_error(&e);
                    warn!(url, attempt = attempts, error = %error, "Request failed");
                    outcome = FetchResult::NetworkError { error, attempts };
                    policy.backoff_for(attempt)
                }
            };

            if policy.has_next(attempt) {
                tokio::time::sleep(delay).await;
            }
        }

        error!(
            url,
            attempts = policy.max_attempts,
            reason = %outcome.describe(),
            "All attempts failed"
        );
        outcome
    }
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}
