//! Domain layer for MeetingDir
//!
//! Holds the geographic value objects exchanged between the directory client
//! and the geocoding subsystem. [`Coordinates`] is the only type the directory
//! client consumes from the geocoder.

pub mod errors;
pub mod value_objects;

pub use errors::DomainError;
pub use value_objects::*;
