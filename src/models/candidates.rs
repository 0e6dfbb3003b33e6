//! Per-document candidate groups and resolved ancestors.

use std::collections::{BTreeMap, HashMap};

use hashbrown::HashSet;

use super::{Location, LocationId};
use crate::geo::{self, GeoCoordinate};
use crate::normalize::fold_key;

/// Name -> candidate locations for one document.
///
/// Keys are folded names (see [`fold_key`]), so lookups are case- and
/// accent-insensitive. Each group keeps the gazetteer's retrieval order and
/// holds no duplicate ids. Names without candidates are never stored.
#[derive(Debug, Clone, Default)]
pub struct CandidateMap {
    groups: BTreeMap<String, Vec<Location>>,
}

impl CandidateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add candidates for `name`, merging with an existing group.
    pub fn insert(&mut self, name: &str, locations: impl IntoIterator<Item = Location>) {
        let mut locations = locations.into_iter().peekable();
        if locations.peek().is_none() {
            return;
        }
        let group = self.groups.entry(fold_key(name)).or_default();
        for location in locations {
            if !group.iter().any(|l| l.id() == location.id()) {
                group.push(location);
            }
        }
    }

    /// Candidates for `name`; empty if the name is unknown.
    pub fn get(&self, name: &str) -> &[Location] {
        self.groups
            .get(&fold_key(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(&fold_key(name))
    }

    /// Groups in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Location])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of names with candidates.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every distinct candidate, in key order then retrieval order.
    pub fn all_locations(&self) -> Vec<&Location> {
        let mut seen = HashSet::new();
        self.groups
            .values()
            .flatten()
            .filter(|l| seen.insert(l.id()))
            .collect()
    }

    /// Drop unlocated candidates from groups that also contain located ones.
    pub fn prefer_located(&mut self) {
        for group in self.groups.values_mut() {
            if group.iter().any(|l| l.coordinate().is_some()) {
                group.retain(|l| l.coordinate().is_some());
            }
        }
    }

    /// Keep only the candidates accepted by `keep`; groups left empty vanish.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &Location) -> bool,
    {
        for (name, group) in self.groups.iter_mut() {
            group.retain(|l| keep(name.as_str(), l));
        }
        self.groups.retain(|_, group| !group.is_empty());
    }
}

impl<'a> FromIterator<(&'a str, Vec<Location>)> for CandidateMap {
    fn from_iter<T: IntoIterator<Item = (&'a str, Vec<Location>)>>(iter: T) -> Self {
        let mut map = CandidateMap::new();
        for (name, locations) in iter {
            map.insert(name, locations);
        }
        map
    }
}

/// Largest pairwise distance within a candidate group.
pub fn group_spread(group: &[Location]) -> f64 {
    let coordinates: Vec<Option<GeoCoordinate>> = group.iter().map(Location::coordinate).collect();
    geo::largest_distance(&coordinates)
}

/// A group is ambiguous when its candidates lie at least `same_distance_km` apart.
pub fn is_ambiguous(group: &[Location], same_distance_km: f64) -> bool {
    group_spread(group) >= same_distance_km
}

/// Resolved ancestor locations, by id.
#[derive(Debug, Clone, Default)]
pub struct AncestorIndex {
    by_id: HashMap<LocationId, Location>,
}

impl AncestorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: Location) {
        self.by_id.insert(location.id(), location);
    }

    pub fn get(&self, id: LocationId) -> Option<&Location> {
        self.by_id.get(&id)
    }

    /// Resolved ancestors of `location`, nearest first. Unresolved ids are skipped.
    pub fn ancestors_of<'a>(&'a self, location: &'a Location) -> impl Iterator<Item = &'a Location> + 'a {
        location.ancestor_ids().iter().filter_map(move |id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl FromIterator<Location> for AncestorIndex {
    fn from_iter<T: IntoIterator<Item = Location>>(iter: T) -> Self {
        let mut index = AncestorIndex::new();
        for location in iter {
            index.insert(location);
        }
        index
    }
}
