//! Rectangular search area used to bias forward geocoding

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DomainError;

/// A bounding box given by its west, south, east and north edges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawViewbox")]
pub struct Viewbox {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

#[derive(Deserialize)]
struct RawViewbox {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl TryFrom<RawViewbox> for Viewbox {
    type Error = DomainError;

    fn try_from(raw: RawViewbox) -> Result<Self, Self::Error> {
        Self::new(raw.west, raw.south, raw.east, raw.north)
    }
}

impl Viewbox {
    /// Create a viewbox
    ///
    /// Edges must be finite, within longitude/latitude range, and `south`
    /// must not exceed `north`. `west > east` is accepted since the provider
    /// treats the two values as opposite corners.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidViewbox` describing the offending edge.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, DomainError> {
        for (name, value, limit) in [
            ("west", west, 180.0),
            ("east", east, 180.0),
            ("south", south, 90.0),
            ("north", north, 90.0),
        ] {
            if !value.is_finite() || value.abs() > limit {
                return Err(DomainError::InvalidViewbox(format!(
                    "{name} edge {value} is outside [-{limit}, {limit}]"
                )));
            }
        }
        if south > north {
            return Err(DomainError::InvalidViewbox(format!(
                "south edge {south} lies north of {north}"
            )));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    #[must_use]
    pub const fn west(&self) -> f64 {
        self.west
    }

    #[must_use]
    pub const fn south(&self) -> f64 {
        self.south
    }

    #[must_use]
    pub const fn east(&self) -> f64 {
        self.east
    }

    #[must_use]
    pub const fn north(&self) -> f64 {
        self.north
    }

    /// Render as the `x1,y1,x2,y2` query value
    #[must_use]
    pub fn to_query_value(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

impl fmt::Display for Viewbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_viewbox_is_valid() {
        let vb = Viewbox::new(-74.03, 40.70, -73.90, 40.88).expect("valid");
        assert_eq!(vb.to_query_value(), "-74.03,40.7,-73.9,40.88");
    }

    #[test]
    fn rejects_out_of_range_edges() {
        assert!(Viewbox::new(-181.0, 0.0, 0.0, 1.0).is_err());
        assert!(Viewbox::new(0.0, -91.0, 1.0, 1.0).is_err());
        assert!(Viewbox::new(0.0, 0.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn rejects_inverted_latitudes() {
        let err = Viewbox::new(0.0, 10.0, 1.0, 5.0).unwrap_err();
        assert!(err.to_string().contains("south"));
    }

    #[test]
    fn deserialization_validates() {
        let ok: Viewbox =
            serde_json::from_str(r#"{"west":1.0,"south":2.0,"east":3.0,"north":4.0}"#)
                .expect("valid viewbox");
        assert!((ok.north() - 4.0).abs() < f64::EPSILON);

        let bad: Result<Viewbox, _> =
            serde_json::from_str(r#"{"west":1.0,"south":9.0,"east":3.0,"north":4.0}"#);
        assert!(bad.is_err());
    }
}
