//! Degrees-minutes-seconds parsing and formatting.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Pattern for one DMS expression: degrees, optional minutes, optional
/// seconds, optional hemisphere. Shared with the coordinate tagger.
pub const DMS_PATTERN: &str = concat!(
    r"([-+]?\d{1,3}(?:\.\d{1,10})?)[°ºd:]",
    r"(?:\s?(\d{1,2}(?:\.\d{1,10})?))?['′:]?",
    r#"(?:\s?(\d{1,2}(?:\.\d{1,10})?))?(?:"|″|'')?"#,
    r"(?:\s?(North|South|West|East|N|S|W|E))?",
);

static DMS_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}$", DMS_PATTERN)).expect("valid DMS regex"));

/// Which axis a decimal value belongs to; decides the hemisphere letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

/// Parse a DMS string such as `40°26′21″N` into decimal degrees.
///
/// The sign comes from the hemisphere letter when one is given, otherwise from
/// the sign of the degree value.
pub fn parse_dms(input: &str) -> Result<f64> {
    let trimmed = input.trim();
    let caps = DMS_EXACT
        .captures(trimmed)
        .ok_or_else(|| Error::InvalidDms(input.to_string()))?;

    let degree_str = &caps[1];
    let degrees: f64 = degree_str
        .parse()
        .map_err(|_| Error::InvalidDms(input.to_string()))?;
    let minutes = parse_group(caps.get(2), input)?;
    let seconds = parse_group(caps.get(3), input)?;

    let negative = match caps.get(4).map(|m| m.as_str()) {
        Some(hemisphere) => matches!(hemisphere, "S" | "W" | "South" | "West"),
        None => degree_str.starts_with('-'),
    };
    let value = degrees.abs() + minutes / 60.0 + seconds / 3600.0;
    Ok(if negative { -value } else { value })
}

fn parse_group(group: Option<regex::Match<'_>>, input: &str) -> Result<f64> {
    match group {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| Error::InvalidDms(input.to_string())),
        None => Ok(0.0),
    }
}

/// Format decimal degrees as `DD°MM′SS″H`, rounded to whole seconds.
pub fn format_dms(value: f64, axis: Axis) -> String {
    let hemisphere = match (axis, value < 0.0) {
        (Axis::Latitude, false) => 'N',
        (Axis::Latitude, true) => 'S',
        (Axis::Longitude, false) => 'E',
        (Axis::Longitude, true) => 'W',
    };

    let total_seconds = (value.abs() * 3600.0).round() as u64;
    let degrees = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}°{}′{}″{}", degrees, minutes, seconds, hemisphere)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_hemisphere() {
        let lat = parse_dms("40°26′21″N").unwrap();
        assert!((lat - 40.439166).abs() < 1e-5);
        let lon = parse_dms("79°58′36″W").unwrap();
        assert!((lon + 79.976666).abs() < 1e-5);
    }

    #[test]
    fn test_parse_sign_without_hemisphere() {
        let v = parse_dms("-33°52′4″").unwrap();
        assert!((v + 33.867777).abs() < 1e-5);
    }

    #[test]
    fn test_parse_degrees_only_and_ascii_marks() {
        assert_eq!(parse_dms("12°").unwrap(), 12.0);
        let v = parse_dms("51°30'26\"N").unwrap();
        assert!((v - 51.507222).abs() < 1e-5);
        let v = parse_dms("0° 7′ 39″ West").unwrap();
        assert!((v + 0.1275).abs() < 1e-5);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_dms("north-ish"), Err(Error::InvalidDms(_))));
        assert!(parse_dms("").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_dms(40.439166, Axis::Latitude), "40°26′21″N");
        assert_eq!(format_dms(-79.976666, Axis::Longitude), "79°58′36″W");
    }

    #[test]
    fn test_format_carries_rounded_seconds() {
        // 10°59′59.9″ rounds up into the next degree
        let v = 10.0 + 59.0 / 60.0 + 59.9 / 3600.0;
        assert_eq!(format_dms(v, Axis::Latitude), "11°0′0″N");
    }

    #[test]
    fn test_round_trip_within_one_arc_second() {
        for s in ["40°26′21″N", "79°58′36″W", "33°51′54″S", "151°12′34″E", "0°0′1″N"] {
            let axis = if s.ends_with('N') || s.ends_with('S') {
                Axis::Latitude
            } else {
                Axis::Longitude
            };
            let decimal = parse_dms(s).unwrap();
            let formatted = format_dms(decimal, axis);
            let back = parse_dms(&formatted).unwrap();
            assert!((back - decimal).abs() * 3600.0 <= 1.0, "{} -> {}", s, formatted);
            assert_eq!(formatted, s);
        }
    }
}
