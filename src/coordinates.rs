//! Tagger for coordinate literals in running text.
//!
//! Recognizes decimal pairs (`40.7128, -74.0060`, `48.85°N, 2.35°E`) and DMS
//! pairs (`40°26′21″N 79°58′36″W`). Each hit becomes an annotation carrying a
//! synthetic location of type `UNDETERMINED` whose id is negative and derived
//! from the coordinate, so it can never collide with a gazetteer id.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use crate::geo::{parse_dms, GeoCoordinate, DMS_PATTERN};
use crate::models::{Location, LocationAnnotation, LocationId, LocationType, Span};

static DMS_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?P<lat>{}),?\s+(?P<lon>{})", DMS_PATTERN, DMS_PATTERN)).expect("valid DMS pair regex")
});

static DECIMAL_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:^|[^\w.+-])",
        r"(?P<pair>(?P<lat>[-+]?\d{1,2}\.\d{2,})°?\s?(?P<lath>[NS])?",
        r"\s*[,;]\s*",
        r"(?P<lon>[-+]?\d{1,3}\.\d{2,})°?\s?(?P<lonh>[EW])?)",
        r"(?:$|[^\w.]|\.(?:$|\s))",
    ))
    .expect("valid decimal pair regex")
});

const SYNTHETIC_SEED: u64 = 0x746f_706f;

/// Stable negative id for a coordinate-literal location.
pub fn synthetic_id(coordinate: &GeoCoordinate) -> LocationId {
    let key = format!("{:.6},{:.6}", coordinate.lat(), coordinate.lon());
    let hash = xxh64(key.as_bytes(), SYNTHETIC_SEED);
    -((hash >> 1) as LocationId) - 1
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateTagger;

impl CoordinateTagger {
    pub fn new() -> Self {
        Self
    }

    /// All coordinate literals in `text`, ordered by position. DMS pairs take
    /// precedence over decimal pairs they overlap.
    pub fn tag(&self, text: &str) -> Vec<LocationAnnotation> {
        let mut annotations: Vec<LocationAnnotation> = Vec::new();

        for caps in DMS_PAIR.captures_iter(text) {
            let (Some(whole), Some(lat), Some(lon)) = (caps.get(0), caps.name("lat"), caps.name("lon")) else {
                continue;
            };
            // times such as "12:30 14:45" share the syntax
            if !(has_degree_sign(lat.as_str()) && has_degree_sign(lon.as_str())) {
                continue;
            }
            let (Ok(lat_value), Ok(lon_value)) = (parse_dms(lat.as_str()), parse_dms(lon.as_str())) else {
                continue;
            };
            if let Some(annotation) = annotation(whole.start(), whole.as_str(), lat_value, lon_value) {
                annotations.push(annotation);
            }
        }

        for caps in DECIMAL_PAIR.captures_iter(text) {
            let Some(pair) = caps.name("pair") else {
                continue;
            };
            if annotations
                .iter()
                .any(|a| a.start() < pair.end() && pair.start() < a.end())
            {
                continue;
            }
            let (Some(lat), Some(lon)) = (signed(&caps, "lat", "lath"), signed(&caps, "lon", "lonh")) else {
                continue;
            };
            if let Some(annotation) = annotation(pair.start(), pair.as_str(), lat, lon) {
                annotations.push(annotation);
            }
        }

        annotations.sort_by_key(|a| a.start());
        annotations
    }
}

fn has_degree_sign(value: &str) -> bool {
    value.contains('°') || value.contains('º')
}

/// Decimal value with the hemisphere letter applied.
fn signed(caps: &Captures<'_>, value: &str, hemisphere: &str) -> Option<f64> {
    let number: f64 = caps.name(value)?.as_str().parse().ok()?;
    Some(match caps.name(hemisphere).map(|m| m.as_str()) {
        Some("S") | Some("W") => -number.abs(),
        Some(_) => number.abs(),
        None => number,
    })
}

fn annotation(start: usize, value: &str, lat: f64, lon: f64) -> Option<LocationAnnotation> {
    let value = value.trim_end();
    match GeoCoordinate::new(lat, lon) {
        Ok(coordinate) => {
            let location = Location::new(synthetic_id(&coordinate), value, LocationType::Undetermined)
                .with_coordinate(coordinate);
            Some(LocationAnnotation::new(Span::new(start, value), location))
        }
        Err(e) => {
            debug!("Ignoring coordinate literal '{}': {}", value, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_pair() {
        let text = "The wreck lies at 40.7128, -74.0060 off the coast.";
        let found = CoordinateTagger::new().tag(text);
        assert_eq!(found.len(), 1);
        let annotation = &found[0];
        assert_eq!(annotation.span.value, "40.7128, -74.0060");
        assert_eq!(&text[annotation.start()..annotation.end()], "40.7128, -74.0060");
        let coordinate = annotation.location.coordinate().unwrap();
        assert!((coordinate.lat() - 40.7128).abs() < 1e-9);
        assert!((coordinate.lon() + 74.006).abs() < 1e-9);
        assert_eq!(annotation.location.location_type(), LocationType::Undetermined);
        assert!(annotation.location.id() < 0);
    }

    #[test]
    fn test_decimal_pair_with_hemispheres() {
        let text = "Camp at 33.86°S, 151.21°E.";
        let found = CoordinateTagger::new().tag(text);
        assert_eq!(found.len(), 1);
        let coordinate = found[0].location.coordinate().unwrap();
        assert!(coordinate.lat() < 0.0 && coordinate.lon() > 0.0);
    }

    #[test]
    fn test_dms_pair() {
        let text = "Pittsburgh (40°26′21″N 79°58′36″W) is on three rivers.";
        let found = CoordinateTagger::new().tag(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span.value, "40°26′21″N 79°58′36″W");
        let coordinate = found[0].location.coordinate().unwrap();
        assert!((coordinate.lat() - 40.439166).abs() < 1e-5);
        assert!((coordinate.lon() + 79.976666).abs() < 1e-5);
    }

    #[test]
    fn test_ignores_times_versions_and_out_of_range() {
        let tagger = CoordinateTagger::new();
        assert!(tagger.tag("We met at 12:30 14:45 today").is_empty());
        assert!(tagger.tag("Upgrade from 1.2.3, 4.5.6 now").is_empty());
        assert!(tagger.tag("Readings 95.1234, 10.5678 were off").is_empty());
    }

    #[test]
    fn test_synthetic_ids_are_stable() {
        let a = GeoCoordinate::new(40.7128, -74.006).unwrap();
        let b = GeoCoordinate::new(40.7128, -74.006).unwrap();
        let c = GeoCoordinate::new(-33.86, 151.21).unwrap();
        assert_eq!(synthetic_id(&a), synthetic_id(&b));
        assert_ne!(synthetic_id(&a), synthetic_id(&c));
        assert!(synthetic_id(&c) < 0);
    }
}
