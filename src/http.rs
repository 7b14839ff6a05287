//! Blocking HTTP plumbing shared by the model providers and the Chroma store.
//!
//! Provides the transport-level error type, client construction with timeout
//! configuration, and retry with exponential backoff for transient failures.

use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Total request timeout applied to every client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection timeout applied to every client.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur when talking to a remote service.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// Non-success HTTP status, with whatever message the service returned
    #[error("HTTP error: status {status}: {message}")]
    Http { status: u16, message: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Service-specific errors reported inside a successful response
    #[error("API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Required credential is not configured
    #[error("Missing API key: set {var} in your .env file or environment")]
    MissingApiKey { var: &'static str },
}

impl ProviderError {
    /// Classifies a transport error from reqwest.
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else {
            Self::Network(error)
        }
    }

    /// Returns the HTTP status if this is an HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Validates a base URL and strips any trailing slash.
pub fn normalize_base_url(url: &str) -> Result<String, ProviderError> {
    reqwest::Url::parse(url).map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", url, e)))?;
    Ok(url.trim_end_matches('/').to_string())
}

/// Creates a blocking client with the standard timeout configuration.
pub fn build_client() -> Result<reqwest::blocking::Client, ProviderError> {
    reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(ProviderError::Network)
}

/// Turns a response into its decoded JSON body, or an `Http` error carrying
/// the response text for non-success statuses.
pub fn read_json<T: DeserializeOwned>(
    response: reqwest::blocking::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response.text().map_err(ProviderError::from_reqwest)?;

    if !status.is_success() {
        return Err(ProviderError::Http {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    serde_json::from_str(&body).map_err(ProviderError::Serialization)
}

/// Extracts a readable message from an error body.
///
/// Understands `{"error": {"message": ...}}`, `{"error": "..."}` and
/// `{"message": "..."}`; falls back to the raw text.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    json.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .or_else(|| json.get("message").and_then(|m| m.as_str()))
        .or_else(|| json.get("error").and_then(|e| e.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Backoff schedule for transient failures.
///
/// The default waits 1s, 2s and 4s before the second, third and fourth
/// attempt respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    /// A policy with explicit delays between attempts.
    pub fn with_delays(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Maximum number of retries after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.delays.len()
    }
}

/// Retries an operation with the policy's backoff schedule.
///
/// Only transient errors (network errors, timeouts, HTTP 5xx) are retried;
/// everything else is returned immediately. Returns the last error once the
/// schedule is exhausted.
pub fn retry_with_backoff<F, T>(policy: &RetryPolicy, f: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Result<T, ProviderError>,
{
    retry_with_backoff_if(policy, is_transient, f)
}

/// Like [`retry_with_backoff`], but only errors accepted by `retryable` are retried.
pub fn retry_with_backoff_if<F, P, T>(
    policy: &RetryPolicy,
    retryable: P,
    mut f: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Result<T, ProviderError>,
    P: Fn(&ProviderError) -> bool,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !retryable(&e) => return Err(e),
        Err(e) => e,
    };

    for (attempt, delay) in policy.delays.iter().enumerate() {
        tracing::warn!(
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %last_error,
            "transient failure, retrying"
        );
        thread::sleep(*delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !retryable(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Network errors, timeouts and HTTP 5xx responses.
pub fn is_transient(error: &ProviderError) -> bool {
    match error {
        ProviderError::Network(_) | ProviderError::Timeout(_) => true,
        ProviderError::Http { status, .. } => (500..600).contains(status),
        ProviderError::Serialization(_)
        | ProviderError::Api { .. }
        | ProviderError::InvalidUrl(_)
        | ProviderError::MissingApiKey { .. } => false,
    }
}
