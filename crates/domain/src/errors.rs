//! Domain-level errors

use thiserror::Error;

/// Errors raised when constructing domain value objects
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Latitude or longitude is NaN or infinite
    #[error("Invalid coordinates: latitude {latitude} and longitude {longitude} must be finite")]
    NonFiniteCoordinates { latitude: f64, longitude: f64 },

    /// Latitude outside [-90, 90]
    #[error("Invalid latitude: {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude outside [-180, 180]
    #[error("Invalid longitude: {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    /// Viewbox corners are inverted
    #[error("Invalid viewbox: {0}")]
    InvalidViewbox(String),
}
