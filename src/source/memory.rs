//! In-memory gazetteer backed by hash indexes and an R-tree.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::{info, warn};

use super::LocationSource;
use crate::error::Result;
use crate::geo::{GeoCoordinate, RadiusIndex};
use crate::models::{AlternativeName, Location, LocationId, LocationType};
use crate::normalize::fold_key;

/// Gazetteer held entirely in memory.
///
/// Names match case- and accent-insensitively against primary and alternative
/// names. Candidates come back in insertion order.
pub struct InMemoryLocationSource {
    locations: Vec<Location>,
    by_name: HashMap<String, Vec<usize>>,
    by_id: HashMap<LocationId, usize>,
    spatial: RadiusIndex,
}

/// One row of the gazetteer TSV.
#[derive(Debug, Deserialize)]
struct TsvRow {
    id: LocationId,
    name: String,
    #[serde(rename = "type", default)]
    location_type: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    lat: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    lon: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    population: Option<u64>,
    /// Comma separated, nearest first
    #[serde(default)]
    ancestors: String,
    /// `|` separated, each `name` or `name@lang`
    #[serde(default)]
    alternatives: String,
}

impl TsvRow {
    fn into_location(self) -> Option<Location> {
        let coordinate = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => match GeoCoordinate::new(lat, lon) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("Skipping coordinate of #{}: {}", self.id, e);
                    None
                }
            },
            _ => None,
        };
        if self.name.trim().is_empty() {
            return None;
        }

        let ancestors = self
            .ancestors
            .split(',')
            .filter_map(|a| a.trim().parse::<LocationId>().ok())
            .collect();
        let alternatives = self
            .alternatives
            .split('|')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| match a.rsplit_once('@') {
                Some((name, lang)) if !lang.is_empty() => AlternativeName::new(name, Some(lang)),
                _ => AlternativeName::new(a, None),
            })
            .collect();

        Some(
            Location::new(self.id, self.name, LocationType::parse_lenient(&self.location_type))
                .with_optional_coordinate(coordinate)
                .with_optional_population(self.population)
                .with_ancestors(ancestors)
                .with_alternative_names(alternatives),
        )
    }
}

impl InMemoryLocationSource {
    /// Index the given locations. A later duplicate id replaces the earlier entry.
    pub fn new(locations: Vec<Location>) -> Self {
        let mut deduped: Vec<Location> = Vec::with_capacity(locations.len());
        let mut by_id = HashMap::new();
        for location in locations {
            match by_id.get(&location.id()) {
                Some(&slot) => deduped[slot] = location,
                None => {
                    by_id.insert(location.id(), deduped.len());
                    deduped.push(location);
                }
            }
        }

        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (slot, location) in deduped.iter().enumerate() {
            for name in location.names() {
                let entry = by_name.entry(fold_key(name)).or_default();
                if !entry.contains(&slot) {
                    entry.push(slot);
                }
            }
        }

        let spatial = RadiusIndex::build(
            deduped
                .iter()
                .enumerate()
                .filter_map(|(slot, l)| l.coordinate().map(|c| (slot, c))),
        );

        Self {
            locations: deduped,
            by_name,
            by_id,
            spatial,
        }
    }

    /// Load a gazetteer TSV (optionally gzipped) with header
    /// `id name type lat lon population ancestors alternatives`.
    pub fn load_tsv(path: &Path) -> Result<Self> {
        info!("Loading gazetteer from {}", path.display());

        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let mut tsv = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .from_reader(reader);

        let mut locations = Vec::new();
        let mut skipped = 0usize;
        for row in tsv.deserialize::<TsvRow>() {
            match row?.into_location() {
                Some(location) => locations.push(location),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Skipped {} gazetteer rows without a name", skipped);
        }

        let source = Self::new(locations);
        info!(
            "Loaded {} locations ({} located, {} names)",
            source.len(),
            source.spatial.len(),
            source.by_name.len()
        );
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn get(&self, id: LocationId) -> Option<&Location> {
        self.by_id.get(&id).map(|&slot| &self.locations[slot])
    }

    /// Candidates for `name`, in insertion order.
    pub fn by_name(&self, name: &str) -> Vec<Location> {
        self.by_name
            .get(&fold_key(name))
            .map(|slots| slots.iter().map(|&s| self.locations[s].clone()).collect())
            .unwrap_or_default()
    }

    /// Located entries within `radius_km` of `center`, nearest first.
    pub fn locations_near(&self, center: &GeoCoordinate, radius_km: f64) -> Vec<&Location> {
        self.spatial
            .within(center, radius_km)
            .into_iter()
            .map(|slot| &self.locations[slot])
            .collect()
    }
}

impl FromIterator<Location> for InMemoryLocationSource {
    fn from_iter<T: IntoIterator<Item = Location>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl LocationSource for InMemoryLocationSource {
    async fn retrieve_locations(&self, names: &[String]) -> Result<HashMap<String, Vec<Location>>> {
        Ok(names
            .iter()
            .map(|name| (name.clone(), self.by_name(name)))
            .filter(|(_, found)| !found.is_empty())
            .collect())
    }

    async fn retrieve_by_ids(&self, ids: &[LocationId]) -> Result<Vec<Location>> {
        Ok(ids.iter().filter_map(|id| self.get(*id)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "id\tname\ttype\tlat\tlon\tpopulation\tancestors\talternatives
1\tEurope\tCONTINENT\t\t\t\t\t
2\tFrance\tCOUNTRY\t46.6\t2.2\t67000000\t1\tFrankreich@de|Francia@es
3\tParis\tCITY\t48.8566\t2.3522\t2100000\t2,1\tParigi@it
4\tParis\tCITY\t33.6609\t-95.5555\t25000\t\t
5\tVersailles\tcity\t48.8049\t2.1204\t85000\t2,1\t
";

    fn write_sample() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_tsv() {
        let file = write_sample();
        let source = InMemoryLocationSource::load_tsv(file.path()).unwrap();
        assert_eq!(source.len(), 5);

        let europe = source.get(1).unwrap();
        assert_eq!(europe.location_type(), LocationType::Continent);
        assert!(europe.coordinate().is_none());
        assert!(europe.population().is_none());

        let paris = source.get(3).unwrap();
        assert_eq!(paris.ancestor_ids(), &[2, 1]);
        assert_eq!(paris.alternative_names()[0].language.as_deref(), Some("it"));
        assert_eq!(source.get(5).unwrap().location_type(), LocationType::City);
    }

    #[test]
    fn test_load_gzipped_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gazetteer.tsv.gz");
        let mut encoder =
            flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let source = InMemoryLocationSource::load_tsv(&path).unwrap();
        assert_eq!(source.len(), 5);
    }

    #[test]
    fn test_name_lookup_is_folded_and_ordered() {
        let file = write_sample();
        let source = InMemoryLocationSource::load_tsv(file.path()).unwrap();

        let ids: Vec<LocationId> = source.by_name("PARIS").iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(source.by_name("frankreich")[0].id(), 2);
        assert!(source.by_name("Atlantis").is_empty());
    }

    #[test]
    fn test_locations_near() {
        let file = write_sample();
        let source = InMemoryLocationSource::load_tsv(file.path()).unwrap();
        let paris = source.get(3).unwrap().coordinate().unwrap();

        let near: Vec<LocationId> = source.locations_near(&paris, 50.0).iter().map(|l| l.id()).collect();
        assert_eq!(near, vec![3, 5]);
    }

    #[tokio::test]
    async fn test_retrieve_keyed_by_given_name() {
        let source: InMemoryLocationSource = vec![
            Location::new(1, "Zürich", LocationType::City),
            Location::new(1, "Zürich", LocationType::City).with_population(400_000),
        ]
        .into_iter()
        .collect();
        assert_eq!(source.len(), 1);

        let found = source
            .retrieve_locations(&["Zurich".to_string(), "Bern".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["Zurich"][0].population(), Some(400_000));
    }
}
