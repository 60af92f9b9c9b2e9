//! Geocoding data models
//!
//! Normalized results handed back to callers of the geocoding facade.

use std::fmt;

use domain::Coordinates;
use serde::{Deserialize, Serialize};

use crate::error::GeocodingError;

/// Structured postal address of a resolved place
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbourhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suburb: Option<String>,
    /// City, or the town or village when the place has no city
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Address {
    /// Format as a compact one-line street address
    #[must_use]
    pub fn format_line(&self) -> String {
        let street = match (&self.road, &self.house_number) {
            (Some(road), Some(number)) => Some(format!("{number} {road}")),
            (Some(road), None) => Some(road.clone()),
            _ => None,
        };

        [
            street.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.postcode.as_deref(),
            self.country.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// A successfully resolved place
///
/// Coordinates are always within range; the subsystem never hands out a
/// partially validated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub coordinates: Coordinates,
    /// Provider's human-readable name for the place
    pub display_name: String,
    /// Provider relevance score, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl fmt::Display for GeocodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.coordinates)
    }
}

/// Per-address outcome of a detailed batch
#[derive(Debug)]
pub struct BatchItem {
    /// Address as supplied by the caller
    pub address: String,
    pub outcome: Result<GeocodeResult, GeocodingError>,
}

impl BatchItem {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
