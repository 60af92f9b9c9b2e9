//! HTTP transport adapter
//!
//! Performs exactly one GET against the provider under a caller-side timeout
//! and classifies the outcome into [`GeocodingError`] kinds.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::GeocodingError;

/// One-shot JSON GET used by the geocoding facade
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and parse the body as JSON
    ///
    /// Failures are classified in this order: timeout, HTTP 429, other HTTP
    /// error status, transport failure, anything else.
    async fn get_json(
        &self,
        url: Url,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Value, GeocodingError>;
}

/// [`Transport`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with its own connection pool
    ///
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, GeocodingError> {
        let client = Client::builder().build().map_err(|e| {
            GeocodingError::network("Failed to initialize HTTP client").with_source(e)
        })?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: Url, user_agent: &str) -> Result<Value, GeocodingError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let mut err = GeocodingError::rate_limited(status.as_u16());
            if let Some(retry_after) = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
            {
                err = err.with_context("retry_after", retry_after);
            }
            return Err(err);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(GeocodingError::api(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }

        if !status.is_success() {
            return Err(GeocodingError::geocoding(format!(
                "Unexpected HTTP status from geocoding provider: {status}"
            ))
            .with_status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify_transport_error)?;

        serde_json::from_slice(&body).map_err(|e| {
            GeocodingError::geocoding("Malformed response payload from geocoding provider")
                .with_source(e)
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get_json(
        &self,
        url: Url,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Value, GeocodingError> {
        debug!(url = %url, timeout_ms = timeout.as_millis(), "Sending geocoding request");

        // The timer belongs to this future and is dropped on every exit path.
        tokio::time::timeout(timeout, self.fetch(url, user_agent))
            .await
            .unwrap_or_else(|_| Err(GeocodingError::timeout(timeout)))
    }
}

fn classify_transport_error(err: reqwest::Error) -> GeocodingError {
    let message = if err.is_connect() {
        "Failed to connect to geocoding provider"
    } else if err.is_timeout() {
        "Connection to geocoding provider timed out"
    } else if err.is_body() || err.is_decode() {
        "Failed to read geocoding response body"
    } else {
        "Geocoding request failed"
    };
    GeocodingError::network(message).with_source(err)
}
