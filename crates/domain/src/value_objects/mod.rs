//! Value Objects - Immutable, identity-less domain primitives

mod coordinates;
mod viewbox;

pub use coordinates::Coordinates;
pub use viewbox::Viewbox;
