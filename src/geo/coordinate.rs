//! Geographic coordinate type and the distance/midpoint/bounding box math.

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean radius of the earth in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Circumference of the earth at the equator in kilometers.
pub const EARTH_CIRCUMFERENCE_KM: f64 = 40075.16;

/// Largest possible distance between two points on earth (half the circumference).
///
/// Returned by [`distance`] when either side has no coordinate, so callers can
/// compare against thresholds without checking for absence first.
pub const EARTH_MAX_DISTANCE_KM: f64 = EARTH_CIRCUMFERENCE_KM * 0.5;

/// A point on earth in decimal degrees.
///
/// Absence of a coordinate is always modelled as `Option<GeoCoordinate>`,
/// never as (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct GeoCoordinate {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for GeoCoordinate {
    type Error = Error;

    fn try_from(raw: RawCoordinate) -> Result<Self> {
        GeoCoordinate::new(raw.lat, raw.lon)
    }
}

impl GeoCoordinate {
    /// Create a coordinate, rejecting values outside [-90, 90] / [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !is_valid_range(lat, lon) {
            return Err(Error::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Great-circle distance to `other` in kilometers.
    pub fn distance(&self, other: &GeoCoordinate) -> f64 {
        Haversine.distance(self.to_point(), other.to_point()) / 1000.0
    }

    /// `[south_lat, west_lon, north_lat, east_lon]` of a box around this point.
    ///
    /// Planar approximation with cosine-latitude correction for the longitude
    /// extent; only meaningful for radii well below earth scale. Latitudes are
    /// clamped to the poles; longitudes are not wrapped, so a box crossing the
    /// antimeridian has `west < -180` or `east > 180`.
    pub fn bounding_box(&self, radius_km: f64) -> [f64; 4] {
        let lat_delta = (radius_km / EARTH_RADIUS_KM).to_degrees();
        let cos_lat = self.lat.to_radians().cos().abs().max(1e-9);
        let lon_delta = (radius_km / (EARTH_RADIUS_KM * cos_lat)).to_degrees();
        [
            (self.lat - lat_delta).max(-90.0),
            self.lon - lon_delta,
            (self.lat + lat_delta).min(90.0),
            self.lon + lon_delta,
        ]
    }

    /// geo uses (x, y) = (lon, lat)
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl std::fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Check that latitude and longitude are in valid range.
pub fn is_valid_range(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Distance in kilometers, or [`EARTH_MAX_DISTANCE_KM`] if either coordinate is absent.
pub fn distance(a: Option<GeoCoordinate>, b: Option<GeoCoordinate>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => a.distance(&b),
        _ => EARTH_MAX_DISTANCE_KM,
    }
}

/// Geographic midpoint of the given coordinates, skipping absent ones.
///
/// Averages the coordinates as 3-D unit vectors and projects back. Returns
/// `None` if no coordinate is present, and (0, 0) when the average vector
/// degenerates to the earth's center (antipodal cancellation).
pub fn midpoint<I>(coordinates: I) -> Option<GeoCoordinate>
where
    I: IntoIterator<Item = Option<GeoCoordinate>>,
{
    let present: Vec<GeoCoordinate> = coordinates.into_iter().flatten().collect();
    match present.len() {
        0 => return None,
        1 => return Some(present[0]),
        _ => {}
    }

    let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
    for c in &present {
        let lat = c.lat.to_radians();
        let lon = c.lon.to_radians();
        x += lat.cos() * lon.cos();
        y += lat.cos() * lon.sin();
        z += lat.sin();
    }
    let count = present.len() as f64;
    x /= count;
    y /= count;
    z /= count;

    if (x * x + y * y + z * z).sqrt() < 1e-9 {
        return Some(GeoCoordinate { lat: 0.0, lon: 0.0 });
    }

    let lon = y.atan2(x).to_degrees();
    let lat = z.atan2((x * x + y * y).sqrt()).to_degrees();
    Some(GeoCoordinate { lat, lon })
}

/// Largest pairwise distance among the given coordinates.
///
/// Zero for fewer than two entries. If more than one entry is given and any
/// of them lacks a coordinate, the result is [`EARTH_MAX_DISTANCE_KM`].
pub fn largest_distance(coordinates: &[Option<GeoCoordinate>]) -> f64 {
    if coordinates.len() < 2 {
        return 0.0;
    }
    if coordinates.iter().any(Option::is_none) {
        return EARTH_MAX_DISTANCE_KM;
    }
    let mut largest: f64 = 0.0;
    for (i, a) in coordinates.iter().enumerate() {
        for b in &coordinates[i + 1..] {
            largest = largest.max(distance(*a, *b));
        }
    }
    largest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> GeoCoordinate {
        GeoCoordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(GeoCoordinate::new(91.0, 0.0).is_err());
        assert!(GeoCoordinate::new(0.0, -180.5).is_err());
        assert!(GeoCoordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_deserialize_validates_range() {
        let ok: GeoCoordinate = serde_json::from_str(r#"{"lat": 1.5, "lon": 2.5}"#).unwrap();
        assert_eq!((ok.lat(), ok.lon()), (1.5, 2.5));
        assert!(serde_json::from_str::<GeoCoordinate>(r#"{"lat": 95.0, "lon": 0.0}"#).is_err());
    }

    #[test]
    fn test_distance_berlin_paris() {
        let berlin = coord(52.5200, 13.4050);
        let paris = coord(48.8566, 2.3522);
        let d = berlin.distance(&paris);
        assert!((d - 878.0).abs() < 5.0, "distance was {}", d);
    }

    #[test]
    fn test_distance_symmetric_and_zero() {
        let a = coord(40.7128, -74.0060);
        let b = coord(-33.8688, 151.2093);
        assert!((a.distance(&b) - b.distance(&a)).abs() < 1e-9);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_distance_missing_coordinate_is_max() {
        let a = coord(10.0, 10.0);
        assert_eq!(distance(Some(a), None), EARTH_MAX_DISTANCE_KM);
        assert_eq!(distance(None, None), EARTH_MAX_DISTANCE_KM);
    }

    #[test]
    fn test_midpoint_single() {
        let a = coord(47.3769, 8.5417);
        assert_eq!(midpoint([Some(a)]), Some(a));
    }

    #[test]
    fn test_midpoint_skips_missing() {
        let a = coord(10.0, 20.0);
        assert_eq!(midpoint([None, Some(a), None]), Some(a));
        assert_eq!(midpoint([None, None]), None);
    }

    #[test]
    fn test_midpoint_two_points_on_equator() {
        let m = midpoint([Some(coord(0.0, 10.0)), Some(coord(0.0, 20.0))]).unwrap();
        assert!(m.lat().abs() < 1e-9);
        assert!((m.lon() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_midpoint_antipodal_is_origin() {
        let m = midpoint([Some(coord(0.0, 0.0)), Some(coord(0.0, 180.0))]).unwrap();
        assert_eq!((m.lat(), m.lon()), (0.0, 0.0));
    }

    #[test]
    fn test_bounding_box_contains_radius() {
        let center = coord(52.0, 13.0);
        let [south, west, north, east] = center.bounding_box(10.0);
        assert!(south < 52.0 && north > 52.0);
        assert!(west < 13.0 && east > 13.0);
        // the box edge lies roughly 10 km away
        let edge = coord(north, 13.0);
        assert!((center.distance(&edge) - 10.0).abs() < 0.1);
        // longitude extent is wider than latitude extent at 52°N
        assert!(east - 13.0 > north - 52.0);
    }

    #[test]
    fn test_bounding_box_crosses_antimeridian() {
        let [_, west, _, east] = coord(-17.0, 179.95).bounding_box(50.0);
        assert!(west < 179.95);
        assert!(east > 180.0);
        let [_, west, _, _] = coord(-17.0, -179.95).bounding_box(50.0);
        assert!(west < -180.0);
    }

    #[test]
    fn test_largest_distance() {
        let a = Some(coord(0.0, 0.0));
        let b = Some(coord(0.0, 1.0));
        let c = Some(coord(0.0, 2.0));
        let d = largest_distance(&[a, b, c]);
        assert!((d - a.unwrap().distance(&c.unwrap())).abs() < 1e-9);
        assert_eq!(largest_distance(&[a]), 0.0);
        assert_eq!(largest_distance(&[a, None]), EARTH_MAX_DISTANCE_KM);
    }
}
