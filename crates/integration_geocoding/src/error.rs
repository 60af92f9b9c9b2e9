//! Geocoding error types

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure categories surfaced by the geocoding subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request did not complete before the caller-side timeout
    Timeout,
    /// DNS, connection or other transport-level failure
    Network,
    /// The provider answered with HTTP 429
    RateLimit,
    /// Provider-side failure: HTTP error status, malformed payload, no
    /// results or out-of-range coordinates
    Geocoding,
    /// Caller input or configuration was rejected before any request
    Validation,
}

impl ErrorKind {
    /// Stable lower-case name used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::Geocoding => "geocoding",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned by every fallible geocoding operation
///
/// Carries the [`ErrorKind`], a human-readable message, the HTTP status when
/// one was received, the originating cause and free-form context entries.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GeocodingError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    #[source]
    source: Option<BoxError>,
    context: BTreeMap<String, String>,
}

impl GeocodingError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Request exceeded its timeout
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Geocoding request timed out after {}ms", after.as_millis()),
        )
    }

    /// Transport-level failure
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Provider rejected the request with HTTP 429
    #[must_use]
    pub fn rate_limited(status: u16) -> Self {
        Self::new(
            ErrorKind::RateLimit,
            format!("Geocoding rate limit exceeded (HTTP {status})"),
        )
        .with_status(status)
    }

    /// Provider answered with an HTTP error status
    #[must_use]
    pub fn api(status: u16, status_text: &str) -> Self {
        let message = if status_text.is_empty() {
            format!("Geocoding API error: HTTP {status}")
        } else {
            format!("Geocoding API error: HTTP {status} {status_text}")
        };
        Self::new(ErrorKind::Geocoding, message)
            .with_status(status)
            .with_context("status_text", status_text)
    }

    /// Provider returned an unusable payload
    pub fn geocoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Geocoding, message)
    }

    /// Provider returned an empty result set
    #[must_use]
    pub fn no_results(address: &str) -> Self {
        Self::new(
            ErrorKind::Geocoding,
            format!("No results found for address: {address}"),
        )
        .with_context("address", address)
    }

    /// Caller input was rejected
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Attach the HTTP status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the originating cause
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach a context entry, replacing any previous value for `key`
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    #[must_use]
    pub const fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Whether repeating the whole client call may succeed
    ///
    /// Independent of the per-call retry loop, which retries every failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Timeout | ErrorKind::Network | ErrorKind::RateLimit => true,
            ErrorKind::Geocoding => self.status.is_some_and(|s| s >= 500),
            ErrorKind::Validation => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(GeocodingError::timeout(Duration::from_secs(10)).is_retryable());
        assert!(GeocodingError::network("connection refused").is_retryable());
        assert!(GeocodingError::rate_limited(429).is_retryable());
        assert!(GeocodingError::api(503, "Service Unavailable").is_retryable());
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!GeocodingError::api(404, "Not Found").is_retryable());
        assert!(!GeocodingError::no_results("nowhere").is_retryable());
        assert!(!GeocodingError::geocoding("bad payload").is_retryable());
        assert!(!GeocodingError::validation("empty address").is_retryable());
    }

    #[test]
    fn test_rate_limit_carries_status() {
        let err = GeocodingError::rate_limited(429);
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.status(), Some(429));
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_api_error_carries_status_text() {
        let err = GeocodingError::api(502, "Bad Gateway");
        assert_eq!(err.kind(), ErrorKind::Geocoding);
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.to_string(), "Geocoding API error: HTTP 502 Bad Gateway");
        assert_eq!(
            err.context().get("status_text").map(String::as_str),
            Some("Bad Gateway")
        );
    }

    #[test]
    fn test_no_results_message() {
        let err = GeocodingError::no_results("Not A Real Address Anywhere");
        assert_eq!(
            err.to_string(),
            "No results found for address: Not A Real Address Anywhere"
        );
        assert_eq!(err.kind(), ErrorKind::Geocoding);
    }

    #[test]
    fn test_timeout_message() {
        let err = GeocodingError::timeout(Duration::from_millis(2500));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("2500ms"));
    }

    #[test]
    fn test_source_is_exposed() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = GeocodingError::network("connect failed").with_source(cause);
        let source = err.source().expect("source attached");
        assert_eq!(source.to_string(), "refused");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::RateLimit.to_string(), "rate_limit");
        assert_eq!(ErrorKind::Validation.to_string(), "validation");
    }
}
