//! Geocoding facade
//!
//! Composes the request queue, retry policy, transport and normalizer into
//! the public `geocode` / `reverse_geocode` / `batch_geocode` operations.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use domain::Coordinates;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{GeocodeOptions, GeocodingConfig};
use crate::error::GeocodingError;
use crate::models::{BatchItem, GeocodeResult};
use crate::normalize::{normalize_reverse, normalize_search};
use crate::queue::RequestQueue;
use crate::retry::RetryPolicy;
use crate::transport::{ReqwestTransport, Transport};

/// Trait for geocoding clients
#[async_trait]
pub trait GeocodingClient: Send + Sync {
    /// Resolve a free-form address to its best-ranked place
    async fn geocode(&self, address: &str) -> Result<GeocodeResult, GeocodingError>;

    /// Resolve coordinates to the place at that position
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<GeocodeResult, GeocodingError>;

    /// Resolve many addresses, keeping only the successes in input order
    ///
    /// Failed addresses are logged and dropped; use
    /// [`batch_geocode_detailed`](Self::batch_geocode_detailed) to see why.
    async fn batch_geocode(&self, addresses: &[String]) -> Vec<GeocodeResult>;

    /// Resolve many addresses, reporting every outcome in input order
    async fn batch_geocode_detailed(&self, addresses: &[String]) -> Vec<BatchItem>;
}

type Normalizer = fn(Value, &str) -> Result<GeocodeResult, GeocodingError>;

/// Nominatim-backed geocoding client
///
/// Owns its request queue: every client instance throttles independently.
pub struct NominatimGeocodingClient {
    transport: Arc<dyn Transport>,
    queue: RequestQueue,
    retry: RetryPolicy,
    options: Arc<GeocodeOptions>,
    search_url: Url,
    reverse_url: Url,
}

impl NominatimGeocodingClient {
    /// Create a client talking HTTP to `config.base_url`
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration, or a network
    /// error if the HTTP client cannot be initialized.
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodingError> {
        let transport = ReqwestTransport::new()?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client on top of a custom transport
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration.
    pub fn with_transport(
        config: &GeocodingConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, GeocodingError> {
        config.validate().map_err(GeocodingError::validation)?;

        let base = config.base_url.trim_end_matches('/');
        let endpoint = |path: &str| {
            Url::parse(&format!("{base}/{path}")).map_err(|e| {
                GeocodingError::validation(format!("Invalid geocoding endpoint: {e}")).with_source(e)
            })
        };

        Ok(Self {
            transport,
            queue: RequestQueue::new(&config.rate_limit)?,
            retry: RetryPolicy::with_max_retries(config.options.retries),
            options: Arc::new(config.options.clone()),
            search_url: endpoint("search")?,
            reverse_url: endpoint("reverse")?,
        })
    }

    /// Number of requests waiting for admission
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }

    /// Number of requests currently executing
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }

    /// Drop all requests that have not started
    ///
    /// Running requests complete normally. Callers awaiting a dropped
    /// request are never woken; see [`RequestQueue::clear`].
    pub fn clear_queue(&self) -> usize {
        self.queue.clear()
    }

    /// Change how many requests may run at once
    ///
    /// # Errors
    ///
    /// Returns a validation error if `concurrency` is zero.
    pub fn set_concurrency(&self, concurrency: usize) -> Result<(), GeocodingError> {
        self.queue.set_concurrency(concurrency)
    }

    /// Wait until every admitted request has finished
    pub async fn on_idle(&self) {
        self.queue.on_idle().await;
    }

    fn build_search_url(&self, address: &str) -> Url {
        let mut url = self.search_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", address)
                .append_pair("format", "json")
                .append_pair("addressdetails", "1")
                .append_pair("limit", "1")
                .append_pair("dedupe", "1");

            if let Some(codes) = &self.options.country_codes {
                let codes: Vec<&str> = codes.split(',').map(str::trim).collect();
                query.append_pair("countrycodes", &codes.join(","));
            }
            if let Some(viewbox) = &self.options.viewbox {
                query.append_pair("viewbox", &viewbox.to_query_value());
                if self.options.bounded {
                    query.append_pair("bounded", "1");
                }
            }
        }
        url
    }

    fn build_reverse_url(&self, coordinates: Coordinates) -> Url {
        let mut url = self.reverse_url.clone();
        url.query_pairs_mut()
            .append_pair("lat", &coordinates.latitude().to_string())
            .append_pair("lon", &coordinates.longitude().to_string())
            .append_pair("format", "json")
            .append_pair("addressdetails", "1");
        url
    }

    /// Queue one retried request and normalize its payload
    async fn execute(
        &self,
        operation: &'static str,
        target: String,
        url: Url,
        normalize: Normalizer,
    ) -> Result<GeocodeResult, GeocodingError> {
        let transport = Arc::clone(&self.transport);
        let options = Arc::clone(&self.options);
        let retry = self.retry;

        let attempt = {
            let target = target.clone();
            move || {
                let transport = Arc::clone(&transport);
                let options = Arc::clone(&options);
                let url = url.clone();
                let target = target.clone();
                async move {
                    let payload = transport
                        .get_json(url, options.timeout(), &options.user_agent)
                        .await?;
                    normalize(payload, &target)
                }
            }
        };

        let on_failed_attempt = {
            let target = target.clone();
            move |err: &GeocodingError, retries_left: u32| {
                warn!(
                    operation,
                    target = %target,
                    kind = %err.kind(),
                    retries_left,
                    error = %err,
                    "Geocoding attempt failed, retrying"
                );
            }
        };

        debug!(operation, target = %target, "Queueing geocoding request");
        self.queue
            .enqueue(move || async move { retry.run(attempt, on_failed_attempt).await })
            .await
    }
}

#[async_trait]
impl GeocodingClient for NominatimGeocodingClient {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<GeocodeResult, GeocodingError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodingError::validation("Address must not be empty"));
        }

        let url = self.build_search_url(address);
        let result = self
            .execute("geocode", address.to_string(), url, normalize_search)
            .await?;

        debug!(
            %address,
            latitude = result.coordinates.latitude(),
            longitude = result.coordinates.longitude(),
            "Geocoded address"
        );
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<GeocodeResult, GeocodingError> {
        let coordinates = Coordinates::new(latitude, longitude).map_err(|e| {
            GeocodingError::validation(e.to_string())
                .with_context("latitude", latitude.to_string())
                .with_context("longitude", longitude.to_string())
                .with_source(e)
        })?;

        let url = self.build_reverse_url(coordinates);
        let result = self
            .execute(
                "reverse_geocode",
                coordinates.to_string(),
                url,
                |payload, _| normalize_reverse(payload),
            )
            .await?;

        debug!(display_name = %result.display_name, "Reverse geocoded coordinates");
        Ok(result)
    }

    #[instrument(skip(self, addresses), fields(count = addresses.len()))]
    async fn batch_geocode(&self, addresses: &[String]) -> Vec<GeocodeResult> {
        self.batch_geocode_detailed(addresses)
            .await
            .into_iter()
            .filter_map(|item| match item.outcome {
                Ok(result) => Some(result),
                Err(err) => {
                    warn!(
                        address = %item.address,
                        kind = %err.kind(),
                        error = %err,
                        "Dropping address from batch result"
                    );
                    None
                },
            })
            .collect()
    }

    #[instrument(skip(self, addresses), fields(count = addresses.len()))]
    async fn batch_geocode_detailed(&self, addresses: &[String]) -> Vec<BatchItem> {
        // join_all polls in order, so admission stays FIFO by input position.
        join_all(addresses.iter().map(|address| async move {
            BatchItem {
                address: address.clone(),
                outcome: self.geocode(address).await,
            }
        }))
        .await
    }
}

impl fmt::Debug for NominatimGeocodingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NominatimGeocodingClient")
            .field("search_url", &self.search_url.as_str())
            .field("reverse_url", &self.reverse_url.as_str())
            .field("retry", &self.retry)
            .field("options", &self.options)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
