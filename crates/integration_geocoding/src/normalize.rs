//! Result normalizer
//!
//! Validates raw Nominatim payloads and reshapes them into [`GeocodeResult`].
//! Selection is the provider's own ranking: the first search hit wins.

use domain::Coordinates;
use serde::Deserialize;
use serde_json::Value;

use crate::error::GeocodingError;
use crate::models::{Address, GeocodeResult};

/// Raw Nominatim place (`format=json`)
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: NumericField,
    lon: NumericField,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

/// Nominatim sends coordinates as strings; accept bare numbers too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumericField {
    Number(f64),
    Text(String),
}

impl NumericField {
    fn parse(&self, name: &str) -> Result<f64, GeocodingError> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().map_err(|e| {
                GeocodingError::geocoding(format!("Invalid {name} in response: '{s}'"))
                    .with_source(e)
            })?,
        };

        if !value.is_finite() {
            return Err(GeocodingError::geocoding(format!(
                "Invalid {name} in response: {value} is not a finite number"
            )));
        }
        Ok(value)
    }
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    neighbourhood: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

impl From<NominatimAddress> for Address {
    fn from(raw: NominatimAddress) -> Self {
        Self {
            house_number: raw.house_number,
            road: raw.road,
            neighbourhood: raw.neighbourhood,
            suburb: raw.suburb,
            city: raw.city.or(raw.town).or(raw.village),
            county: raw.county,
            state: raw.state,
            postcode: raw.postcode,
            country: raw.country,
        }
    }
}

impl NominatimPlace {
    fn into_result(self) -> Result<GeocodeResult, GeocodingError> {
        let latitude = self.lat.parse("latitude")?;
        let longitude = self.lon.parse("longitude")?;

        let coordinates = Coordinates::new(latitude, longitude).map_err(|e| {
            GeocodingError::geocoding(format!("Out-of-range coordinates in response: {e}"))
                .with_context("latitude", latitude.to_string())
                .with_context("longitude", longitude.to_string())
                .with_source(e)
        })?;

        Ok(GeocodeResult {
            coordinates,
            display_name: self.display_name.unwrap_or_default(),
            confidence: self.importance.filter(|score| score.is_finite()),
            address: self.address.map(Address::from),
        })
    }
}

fn malformed(err: serde_json::Error) -> GeocodingError {
    GeocodingError::geocoding(format!("Malformed geocoding response: {err}")).with_source(err)
}

/// Normalize a `/search` payload for `address`
///
/// # Errors
///
/// Returns a `Geocoding` error when the payload is not a list of places, is
/// empty, or its first place has unusable coordinates.
pub fn normalize_search(payload: Value, address: &str) -> Result<GeocodeResult, GeocodingError> {
    let places: Vec<Value> = serde_json::from_value(payload).map_err(malformed)?;

    // Only the top-ranked place is read; later entries are never inspected.
    let first = places
        .into_iter()
        .next()
        .ok_or_else(|| GeocodingError::no_results(address))?;

    serde_json::from_value::<NominatimPlace>(first)
        .map_err(malformed)?
        .into_result()
}

/// Normalize a `/reverse` payload
///
/// # Errors
///
/// Returns a `Geocoding` error when the payload is absent, is a provider
/// error object (e.g. `{"error": "Unable to geocode"}`), or has unusable
/// coordinates.
pub fn normalize_reverse(payload: Value) -> Result<GeocodeResult, GeocodingError> {
    match &payload {
        Value::Null => {
            return Err(GeocodingError::geocoding(
                "No result returned for reverse geocoding",
            ));
        },
        Value::Object(map) => {
            if let Some(reason) = map.get("error") {
                let reason = reason.as_str().map_or_else(|| reason.to_string(), str::to_string);
                return Err(GeocodingError::geocoding(format!(
                    "Reverse geocoding failed: {reason}"
                ))
                .with_context("provider_error", reason));
            }
        },
        _ => {},
    }

    let place: NominatimPlace = serde_json::from_value(payload).map_err(malformed)?;
    place.into_result()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn times_square_place() -> Value {
        json!({
            "place_id": 12345,
            "lat": "40.7579747",
            "lon": "-73.9855426",
            "display_name": "Times Square, Manhattan, New York County, New York, United States",
            "importance": 0.82,
            "address": {
                "road": "7th Avenue",
                "neighbourhood": "Theater District",
                "suburb": "Manhattan",
                "city": "New York",
                "county": "New York County",
                "state": "New York",
                "postcode": "10036",
                "country": "United States"
            }
        })
    }

    #[test]
    fn search_picks_first_result() {
        let second = json!({"lat": "51.5", "lon": "-0.12", "display_name": "Elsewhere"});
        let payload = json!([times_square_place(), second]);

        let result = normalize_search(payload, "Times Square, New York, NY").unwrap();

        assert!((result.coordinates.latitude() - 40.757_974_7).abs() < 1e-9);
        assert!((result.coordinates.longitude() + 73.985_542_6).abs() < 1e-9);
        assert!(result.display_name.contains("New York"));
        assert_eq!(result.confidence, Some(0.82));
        let address = result.address.unwrap();
        assert_eq!(address.city.as_deref(), Some("New York"));
        assert_eq!(address.suburb.as_deref(), Some("Manhattan"));
        assert_eq!(address.postcode.as_deref(), Some("10036"));
    }

    #[test]
    fn search_ignores_shape_of_later_results() {
        let payload = json!([
            {"lat": "40.7", "lon": "-73.9", "display_name": "First"},
            {"osm_id": 1},
            "not even an object"
        ]);

        let result = normalize_search(payload, "x").unwrap();

        assert_eq!(result.display_name, "First");
        assert!((result.coordinates.latitude() - 40.7).abs() < 1e-9);
    }

    #[test]
    fn search_rejects_malformed_first_result() {
        let payload = json!([{"osm_id": 1}, {"lat": "40.7", "lon": "-73.9"}]);
        let err = normalize_search(payload, "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geocoding);
        assert!(err.to_string().starts_with("Malformed"));
    }

    #[test]
    fn search_empty_payload_is_no_results() {
        let err = normalize_search(json!([]), "Not A Real Address Anywhere").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geocoding);
        assert_eq!(
            err.to_string(),
            "No results found for address: Not A Real Address Anywhere"
        );
    }

    #[test]
    fn search_rejects_non_array_payload() {
        let err = normalize_search(json!({"unexpected": true}), "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geocoding);
        assert!(err.to_string().starts_with("Malformed"));
    }

    #[test]
    fn search_rejects_unparseable_latitude() {
        let payload = json!([{"lat": "north-ish", "lon": "0"}]);
        let err = normalize_search(payload, "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geocoding);
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn search_rejects_nan_and_infinite() {
        for (lat, lon) in [("NaN", "0"), ("0", "inf"), ("-infinity", "1")] {
            let payload = json!([{"lat": lat, "lon": lon}]);
            let err = normalize_search(payload, "x").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Geocoding, "{lat},{lon}");
            assert!(err.to_string().contains("finite"), "{lat},{lon}");
        }
    }

    #[test]
    fn search_rejects_out_of_range() {
        for (lat, lon) in [("90.5", "0"), ("-91", "0"), ("0", "180.01"), ("0", "-200")] {
            let payload = json!([{"lat": lat, "lon": lon}]);
            let err = normalize_search(payload, "x").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Geocoding);
            assert!(err.to_string().contains("Out-of-range"), "{lat},{lon}");
        }
    }

    #[test]
    fn search_accepts_boundaries_and_numbers() {
        let payload = json!([{"lat": 90.0, "lon": -180.0, "display_name": "Pole"}]);
        let result = normalize_search(payload, "x").unwrap();
        assert!((result.coordinates.latitude() - 90.0).abs() < f64::EPSILON);
        assert!((result.coordinates.longitude() + 180.0).abs() < f64::EPSILON);
        assert!(result.address.is_none());
        assert!(result.confidence.is_none());
    }

    #[test]
    fn city_falls_back_to_town_then_village() {
        let town = json!([{
            "lat": "1", "lon": "1",
            "address": {"town": "Smallville", "village": "Tiny"}
        }]);
        let village = json!([{
            "lat": "1", "lon": "1",
            "address": {"village": "Tiny"}
        }]);
        let city_wins = json!([{
            "lat": "1", "lon": "1",
            "address": {"city": "Metropolis", "town": "Smallville", "village": "Tiny"}
        }]);

        let city_of = |payload| {
            normalize_search(payload, "x")
                .unwrap()
                .address
                .unwrap()
                .city
        };
        assert_eq!(city_of(town).as_deref(), Some("Smallville"));
        assert_eq!(city_of(village).as_deref(), Some("Tiny"));
        assert_eq!(city_of(city_wins).as_deref(), Some("Metropolis"));
    }

    #[test]
    fn reverse_maps_single_object() {
        let result = normalize_reverse(times_square_place()).unwrap();
        assert!(result.display_name.contains("New York"));
        assert_eq!(
            result.address.and_then(|a| a.road).as_deref(),
            Some("7th Avenue")
        );
    }

    #[test]
    fn reverse_absent_payload_fails() {
        let err = normalize_reverse(Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geocoding);
    }

    #[test]
    fn reverse_provider_error_object_fails() {
        let err = normalize_reverse(json!({"error": "Unable to geocode"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geocoding);
        assert!(err.to_string().contains("Unable to geocode"));
        assert_eq!(
            err.context().get("provider_error").map(String::as_str),
            Some("Unable to geocode")
        );
    }

    #[test]
    fn reverse_rejects_out_of_range() {
        let err = normalize_reverse(json!({"lat": "123", "lon": "0"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geocoding);
    }
}
