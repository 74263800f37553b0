//! Error type definitions.
//!
//! This module defines the failure taxonomy used throughout the delivery
//! engine. Each failure domain gets its own enum so callers can match on
//! what actually went wrong instead of parsing strings.

use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Errors raised while validating a collector URL, project token, or payload.
///
/// Validation failures drop the report before any network or storage work;
/// they are counted in statistics but never retried.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The URL string could not be parsed at all.
    #[error("Failed to parse URL '{url}': {reason}")]
    MalformedUrl {
        /// The offending URL string.
        url: String,
        /// Parser error description.
        reason: String,
    },

    /// HTTPS is required but the URL uses another scheme.
    #[error("HTTPS is required for the collector URL (got '{0}')")]
    HttpsRequired(String),

    /// The URL has no host component.
    #[error("URL has no host component: {0}")]
    MissingHost(String),

    /// The host is not covered by the configured allow-list.
    #[error("Host '{0}' is not in the allowed domains list")]
    DomainNotAllowed(String),

    /// The host is a private, loopback, or link-local address.
    #[error("Host '{0}' is a private or loopback address, refusing to send reports there")]
    PrivateHost(String),

    /// The project token is empty.
    #[error("Project token is empty")]
    EmptyToken,

    /// The project token is shorter than the minimum length.
    #[error("Project token is too short ({0} chars, minimum 8)")]
    TokenTooShort(usize),

    /// The project token matches a known placeholder value.
    #[error("Project token looks like a placeholder value: '{0}'")]
    PlaceholderToken(String),

    /// The project token matches a known secret-credential format.
    #[error("Project token matches a known secret-credential format")]
    SecretLikeToken,

    /// The serialized payload exceeds the configured ceiling.
    #[error("Payload size {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Serialized payload size in bytes.
        size: usize,
        /// Configured maximum in bytes.
        limit: usize,
    },
}

/// Fatal configuration errors raised at construction or on a config update.
///
/// These surface to the caller immediately; the reporter never starts (or
/// keeps its previous configuration) when one is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The collector URL failed validation.
    #[error("Invalid collector URL: {0}")]
    InvalidUrl(#[source] ValidationError),

    /// The project token failed validation.
    #[error("Invalid project token: {0}")]
    InvalidToken(#[source] ValidationError),

    /// The HTTP client could not be constructed.
    #[error("HTTP client initialization error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failures of a single delivery attempt.
///
/// Fed to the retry classifier: 401/403 and circuit-open rejections are
/// terminal, everything else is considered transient.
#[derive(Error, Debug)]
pub enum SendError {
    /// The collector answered with a non-2xx status.
    #[error("Collector returned HTTP {status}: {reason}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or canned description.
        reason: String,
    },

    /// The request timed out and was aborted.
    #[error("Request to collector timed out")]
    Timeout,

    /// The request failed below the HTTP layer (DNS, TCP, TLS).
    #[error("Network error: {0}")]
    Network(String),

    /// The circuit breaker rejected the call without attempting it.
    #[error("Circuit breaker is open, request rejected")]
    CircuitOpen,

    /// The payload failed validation on its way out.
    #[error("Payload rejected before send: {0}")]
    Validation(#[from] ValidationError),

    /// The payload could not be serialized.
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SendError {
    /// Maps a `reqwest::Error` onto the transport taxonomy.
    ///
    /// Timeouts get their own variant so the retry classifier and the
    /// statistics surface can distinguish them from connection failures.
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            SendError::Timeout
        } else {
            SendError::Network(error.to_string())
        }
    }
}

/// Errors raised by the compression service.
///
/// Decompression raises the variant naming the first failing stage and
/// never returns a partial result.
#[derive(Error, Debug)]
pub enum CompressionError {
    /// The base64 text could not be decoded.
    #[error("Failed to decode base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The deflate stream was truncated or corrupt.
    #[error("Deflate stream error: {0}")]
    Deflate(#[from] std::io::Error),

    /// The inflated bytes were not valid UTF-8.
    #[error("Decompressed payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The inflated text was not valid JSON.
    #[error("Decompressed payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the durable state store.
///
/// Persistence failures are logged and absorbed; the engine degrades to
/// in-memory behavior rather than failing a report.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The backing database file could not be created or opened.
    #[error("Failed to open state store: {0}")]
    Open(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// A persisted record could not be serialized.
    #[error("Failed to serialize persisted state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reasons a captured report was dropped instead of delivered.
///
/// Drops are outcomes, not exceptions: the reporting entry points record
/// them in statistics and return them to the caller as values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum DropReason {
    /// The per-window request cap was hit.
    RateLimited,
    /// An identical error fingerprint was seen within the dedup window.
    DuplicateError,
    /// The daily send budget is exhausted.
    DailyQuotaExceeded,
    /// The monthly send budget is exhausted.
    MonthlyQuotaExceeded,
    /// The burst send budget is exhausted.
    BurstQuotaExceeded,
    /// The serialized payload exceeded the size ceiling.
    PayloadTooLarge,
    /// The payload failed outbound validation for another reason.
    InvalidPayload,
    /// Delivery failed after retries and offline queueing is disabled.
    SendFailed,
    /// The offline queue was full and this was the oldest entry.
    QueueOverflow,
    /// The entry sat in the offline queue past its maximum age.
    QueueExpired,
    /// The entry exhausted its offline replay attempts.
    QueueRetriesExhausted,
}

impl DropReason {
    /// Returns a human-readable description of the drop reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::RateLimited => "Rate limit exceeded",
            DropReason::DuplicateError => "Duplicate error suppressed",
            DropReason::DailyQuotaExceeded => "Daily quota exceeded",
            DropReason::MonthlyQuotaExceeded => "Monthly quota exceeded",
            DropReason::BurstQuotaExceeded => "Burst quota exceeded",
            DropReason::PayloadTooLarge => "Payload too large",
            DropReason::InvalidPayload => "Payload failed validation",
            DropReason::SendFailed => "Delivery failed and offline queueing is disabled",
            DropReason::QueueOverflow => "Evicted from full offline queue",
            DropReason::QueueExpired => "Expired in offline queue",
            DropReason::QueueRetriesExhausted => "Offline replay attempts exhausted",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
