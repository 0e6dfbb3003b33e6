//! Location entity returned by gazetteers.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::geo::{self, GeoCoordinate};

/// Gazetteer-defined location identifier.
pub type LocationId = i64;

/// Kind of geographic entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Continent,
    Country,
    City,
    /// Administrative subdivision (state, province, county)
    Unit,
    Region,
    Poi,
    Landmark,
    Street,
    #[serde(rename = "STREETNR")]
    StreetNr,
    Zip,
    #[default]
    Undetermined,
}

impl LocationType {
    pub const ALL: [LocationType; 11] = [
        LocationType::Continent,
        LocationType::Country,
        LocationType::City,
        LocationType::Unit,
        LocationType::Region,
        LocationType::Poi,
        LocationType::Landmark,
        LocationType::Street,
        LocationType::StreetNr,
        LocationType::Zip,
        LocationType::Undetermined,
    ];

    /// Parse a type name; unknown or empty values map to `Undetermined`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "CONTINENT" => Self::Continent,
            "COUNTRY" => Self::Country,
            "CITY" => Self::City,
            "UNIT" => Self::Unit,
            "REGION" => Self::Region,
            "POI" => Self::Poi,
            "LANDMARK" => Self::Landmark,
            "STREET" => Self::Street,
            "STREETNR" | "STREET_NR" => Self::StreetNr,
            "ZIP" => Self::Zip,
            _ => Self::Undetermined,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continent => "CONTINENT",
            Self::Country => "COUNTRY",
            Self::City => "CITY",
            Self::Unit => "UNIT",
            Self::Region => "REGION",
            Self::Poi => "POI",
            Self::Landmark => "LANDMARK",
            Self::Street => "STREET",
            Self::StreetNr => "STREETNR",
            Self::Zip => "ZIP",
            Self::Undetermined => "UNDETERMINED",
        }
    }

    /// Continents and countries are trusted as anchors on sight.
    pub fn is_top_level(&self) -> bool {
        matches!(self, Self::Continent | Self::Country)
    }
}

impl std::fmt::Display for LocationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alternative name, optionally tagged with an ISO 639-1 language code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlternativeName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl AlternativeName {
    pub fn new(name: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            name: name.into(),
            language: language.map(str::to_string),
        }
    }
}

/// Serialized form of a [`Location`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocationRecord {
    id: LocationId,
    primary_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    alternative_names: Vec<AlternativeName>,
    #[serde(rename = "type", default)]
    location_type: LocationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coordinate: Option<GeoCoordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    population: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ancestor_ids: Vec<LocationId>,
}

/// A real-world place.
///
/// Immutable once built. Two locations are equal iff their ids are equal, and
/// the ancestor chain (nearest first, root last) never contains the location's
/// own id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "LocationRecord", into = "LocationRecord")]
pub struct Location {
    id: LocationId,
    primary_name: String,
    alternative_names: Vec<AlternativeName>,
    location_type: LocationType,
    coordinate: Option<GeoCoordinate>,
    population: Option<u64>,
    ancestor_ids: Vec<LocationId>,
}

impl From<LocationRecord> for Location {
    fn from(record: LocationRecord) -> Self {
        Location::new(record.id, record.primary_name, record.location_type)
            .with_alternative_names(record.alternative_names)
            .with_optional_coordinate(record.coordinate)
            .with_optional_population(record.population)
            .with_ancestors(record.ancestor_ids)
    }
}

impl From<Location> for LocationRecord {
    fn from(location: Location) -> Self {
        LocationRecord {
            id: location.id,
            primary_name: location.primary_name,
            alternative_names: location.alternative_names,
            location_type: location.location_type,
            coordinate: location.coordinate,
            population: location.population,
            ancestor_ids: location.ancestor_ids,
        }
    }
}

impl Location {
    pub fn new(id: LocationId, primary_name: impl Into<String>, location_type: LocationType) -> Self {
        Self {
            id,
            primary_name: primary_name.into(),
            alternative_names: Vec::new(),
            location_type,
            coordinate: None,
            population: None,
            ancestor_ids: Vec::new(),
        }
    }

    pub fn with_coordinate(self, coordinate: GeoCoordinate) -> Self {
        self.with_optional_coordinate(Some(coordinate))
    }

    pub fn with_optional_coordinate(mut self, coordinate: Option<GeoCoordinate>) -> Self {
        self.coordinate = coordinate;
        self
    }

    pub fn with_population(self, population: u64) -> Self {
        self.with_optional_population(Some(population))
    }

    pub fn with_optional_population(mut self, population: Option<u64>) -> Self {
        self.population = population;
        self
    }

    /// Set the ancestor chain, nearest first. Self references are dropped.
    pub fn with_ancestors(mut self, ancestor_ids: Vec<LocationId>) -> Self {
        let id = self.id;
        self.ancestor_ids = ancestor_ids.into_iter().filter(|a| *a != id).collect();
        self
    }

    pub fn with_alternative_name(mut self, name: impl Into<String>, language: Option<&str>) -> Self {
        self.alternative_names.push(AlternativeName::new(name, language));
        self
    }

    pub fn with_alternative_names(mut self, names: Vec<AlternativeName>) -> Self {
        self.alternative_names.extend(names);
        self
    }

    pub fn id(&self) -> LocationId {
        self.id
    }

    pub fn primary_name(&self) -> &str {
        &self.primary_name
    }

    pub fn alternative_names(&self) -> &[AlternativeName] {
        &self.alternative_names
    }

    /// Primary name followed by all alternative names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_name.as_str())
            .chain(self.alternative_names.iter().map(|a| a.name.as_str()))
    }

    pub fn location_type(&self) -> LocationType {
        self.location_type
    }

    pub fn coordinate(&self) -> Option<GeoCoordinate> {
        self.coordinate
    }

    pub fn population(&self) -> Option<u64> {
        self.population
    }

    pub fn population_or_zero(&self) -> u64 {
        self.population.unwrap_or(0)
    }

    pub fn ancestor_ids(&self) -> &[LocationId] {
        &self.ancestor_ids
    }

    pub fn parent_id(&self) -> Option<LocationId> {
        self.ancestor_ids.first().copied()
    }

    /// Number of ancestors in the chain.
    pub fn depth(&self) -> usize {
        self.ancestor_ids.len()
    }

    /// `other` appears anywhere in this location's ancestor chain.
    pub fn descendant_of(&self, other: &Location) -> bool {
        self.ancestor_ids.contains(&other.id)
    }

    /// `other` is the direct parent of this location.
    pub fn child_of(&self, other: &Location) -> bool {
        self.parent_id() == Some(other.id)
    }

    /// Both share the same direct parent.
    pub fn sibling_of(&self, other: &Location) -> bool {
        self.id != other.id && self.parent_id().is_some() && self.parent_id() == other.parent_id()
    }

    /// Distance in kilometers; the earth-scale sentinel if either is unlocated.
    pub fn distance(&self, other: &Location) -> f64 {
        geo::distance(self.coordinate, other.coordinate)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, #{})", self.primary_name, self.location_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_by_id() {
        let a = Location::new(1, "Paris", LocationType::City).with_population(2_100_000);
        let b = Location::new(1, "Paris (alt)", LocationType::Unit);
        let c = Location::new(2, "Paris", LocationType::City);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_self_reference_dropped() {
        let l = Location::new(5, "Texas", LocationType::Unit).with_ancestors(vec![5, 10, 5, 20]);
        assert_eq!(l.ancestor_ids(), &[10, 20]);
        assert_eq!(l.parent_id(), Some(10));
    }

    #[test]
    fn test_hierarchy_relations() {
        let country = Location::new(10, "United States", LocationType::Country);
        let state = Location::new(20, "Texas", LocationType::Unit).with_ancestors(vec![10]);
        let city = Location::new(30, "Paris", LocationType::City).with_ancestors(vec![20, 10]);
        let other = Location::new(31, "Dallas", LocationType::City).with_ancestors(vec![20, 10]);

        assert!(city.descendant_of(&country));
        assert!(city.child_of(&state));
        assert!(!city.child_of(&country));
        assert!(city.sibling_of(&other));
        assert!(!city.sibling_of(&city));
        assert_eq!(city.depth(), 2);
    }

    #[test]
    fn test_deserialize_strips_self_id_and_defaults_type() {
        let json = r#"{"id": 7, "primary_name": "Somewhere", "ancestor_ids": [7, 1],
                       "coordinate": {"lat": 1.0, "lon": 2.0}}"#;
        let location: Location = serde_json::from_str(json).unwrap();
        assert_eq!(location.ancestor_ids(), &[1]);
        assert_eq!(location.location_type(), LocationType::Undetermined);
        assert_eq!(location.coordinate().map(|c| c.lat()), Some(1.0));
        assert_eq!(location.population(), None);
    }

    #[test]
    fn test_serialize_uses_type_key() {
        let location = Location::new(3, "Asia", LocationType::Continent);
        let value = serde_json::to_value(&location).unwrap();
        assert_eq!(value["type"], "CONTINENT");
        assert!(value.get("population").is_none());
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(LocationType::parse_lenient("city"), LocationType::City);
        assert_eq!(LocationType::parse_lenient("STREETNR"), LocationType::StreetNr);
        assert_eq!(LocationType::parse_lenient("volcano"), LocationType::Undetermined);
        for t in LocationType::ALL {
            assert_eq!(LocationType::parse_lenient(t.as_str()), t);
        }
    }

    #[test]
    fn test_names_iterates_alternatives() {
        let l = Location::new(1, "München", LocationType::City)
            .with_alternative_name("Munich", Some("en"))
            .with_alternative_name("Monaco di Baviera", None);
        let names: Vec<&str> = l.names().collect();
        assert_eq!(names, vec!["München", "Munich", "Monaco di Baviera"]);
    }
}
