//! Geographic primitives: coordinates, distances, DMS notation and a radius index.

pub mod coordinate;
pub mod dms;
pub mod index;

pub use coordinate::{
    distance, is_valid_range, largest_distance, midpoint, GeoCoordinate, EARTH_MAX_DISTANCE_KM,
    EARTH_RADIUS_KM,
};
pub use dms::{format_dms, parse_dms, Axis, DMS_PATTERN};
pub use index::RadiusIndex;
