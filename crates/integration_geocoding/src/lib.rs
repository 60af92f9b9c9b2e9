//! Geocoding integration for MeetingDir
//!
//! Resolves free-text addresses to coordinates (and back) via
//! [Nominatim/OpenStreetMap](https://nominatim.openstreetmap.org), so the
//! directory client can turn "meetings near this address" into a
//! coordinate search.
//!
//! # Architecture
//!
//! A call flows through four components owned by one
//! [`NominatimGeocodingClient`]:
//!
//! 1. [`RequestQueue`] admits requests in FIFO order under the provider's
//!    rate limit (one request per second by default).
//! 2. [`RetryPolicy`] re-runs a failed attempt with exponential backoff.
//! 3. [`Transport`] performs one HTTP GET under a timeout and classifies the
//!    failure.
//! 4. [`normalize_search`] / [`normalize_reverse`] validate the payload and
//!    build a [`GeocodeResult`] with in-range [`Coordinates`].
//!
//! Every failure surfaces as a [`GeocodingError`] with an [`ErrorKind`].
//!
//! # Example
//!
//! ```rust,ignore
//! use integration_geocoding::{GeocodingClient, GeocodingConfig, NominatimGeocodingClient};
//!
//! let client = NominatimGeocodingClient::new(&GeocodingConfig::default())?;
//! let place = client.geocode("Times Square, New York, NY").await?;
//! println!("{} -> {}", place.display_name, place.coordinates);
//! ```

mod client;
mod config;
mod error;
mod models;
mod normalize;
mod queue;
mod retry;
mod transport;

pub use client::{GeocodingClient, NominatimGeocodingClient};
pub use config::{GeocodeOptions, GeocodingConfig, RateLimitOptions};
pub use domain::{Coordinates, Viewbox};
pub use error::{ErrorKind, GeocodingError};
pub use models::{Address, BatchItem, GeocodeResult};
pub use normalize::{normalize_reverse, normalize_search};
pub use queue::{QueueHandle, RequestQueue};
pub use retry::{DEFAULT_FACTOR, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY, RetryOutcome, RetryPolicy};
pub use transport::{ReqwestTransport, Transport};
