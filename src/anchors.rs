//! Anchor locations: high-confidence candidates used to disambiguate the rest.

use hashbrown::HashSet;
use tracing::debug;

use crate::config::DisambiguationConfig;
use crate::geo;
use crate::models::{group_spread, AncestorIndex, CandidateMap, Location, LocationId, LocationType};
use crate::normalize::{fold_key, token_count};

/// Ordered set of anchor locations for one document.
#[derive(Debug, Clone, Default)]
pub struct Anchors {
    locations: Vec<Location>,
    ids: HashSet<LocationId>,
}

impl Anchors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `location` unless already present. Returns whether it was added.
    pub fn insert(&mut self, location: &Location) -> bool {
        if self.ids.insert(location.id()) {
            self.locations.push(location.clone());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.ids.contains(&location.id())
    }

    pub fn contains_id(&self, id: LocationId) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn retain<F: FnMut(&Location) -> bool>(&mut self, mut keep: F) {
        let ids = &mut self.ids;
        self.locations.retain(|l| {
            let kept = keep(l);
            if !kept {
                ids.remove(&l.id());
            }
            kept
        });
    }
}

impl<'a> FromIterator<&'a Location> for Anchors {
    fn from_iter<T: IntoIterator<Item = &'a Location>>(iter: T) -> Self {
        let mut anchors = Anchors::new();
        for location in iter {
            anchors.insert(location);
        }
        anchors
    }
}

/// Located candidates if there are any, otherwise the whole group.
pub fn located_or_all(group: &[Location]) -> Vec<&Location> {
    let located: Vec<&Location> = group.iter().filter(|l| l.coordinate().is_some()).collect();
    if located.is_empty() {
        group.iter().collect()
    } else {
        located
    }
}

/// Candidate with the highest known population; earliest wins ties.
pub fn biggest<'a, I>(locations: I) -> Option<&'a Location>
where
    I: IntoIterator<Item = &'a Location>,
{
    let mut best: Option<&Location> = None;
    for location in locations {
        let Some(population) = location.population() else {
            continue;
        };
        if best.map_or(true, |b| population > b.population_or_zero()) {
            best = Some(location);
        }
    }
    best
}

/// Derive the anchor set for a document.
///
/// A candidate is an anchor when it is a continent or country, when its
/// population exceeds `anchor_population`, or when it is the biggest member of
/// a geographically tight group that is populous or has a long name. If none
/// is found, the lasso heuristic (when enabled) and then the single most
/// populous candidate are used as fallbacks.
pub fn select_anchors(candidates: &CandidateMap, config: &DisambiguationConfig) -> Anchors {
    let mut anchors = Anchors::new();

    for location in candidates.all_locations() {
        if location.location_type().is_top_level()
            || location.population_or_zero() > config.anchor_population
        {
            if anchors.insert(location) {
                debug!("Prominent anchor location: {}", location);
            }
        }
    }

    for (name, group) in candidates.iter() {
        let group = located_or_all(group);
        let spread = geo::largest_distance(&group.iter().map(|l| l.coordinate()).collect::<Vec<_>>());
        if spread >= config.same_distance_km {
            debug!("Ambiguous location: {} ({} candidates)", name, group.len());
            continue;
        }
        let Some(location) = biggest(group.iter().copied()).or(group.first().copied()) else {
            continue;
        };
        if location.population_or_zero() > config.lower_population
            || token_count(name) >= config.token_threshold
        {
            if anchors.insert(location) {
                debug!("Unambiguous anchor location: {}", location);
            }
        }
    }

    if anchors.is_empty() && config.lasso_enabled {
        for location in lasso(candidates, config) {
            anchors.insert(&location);
        }
    }

    if anchors.is_empty() {
        if let Some(location) = biggest(candidates.all_locations()) {
            debug!("No anchor found, took biggest location: {}", location);
            anchors.insert(location);
        } else {
            debug!("No anchor found");
        }
    }
    anchors
}

/// Add the resolved ancestors of every anchor, skipping the universal root.
pub fn expand_with_ancestors(anchors: &mut Anchors, ancestors: &AncestorIndex, root_name: &str) {
    let current: Vec<Location> = anchors.iter().cloned().collect();
    for anchor in &current {
        for ancestor in ancestors.ancestors_of(anchor) {
            if ancestor.primary_name().eq_ignore_ascii_case(root_name) {
                continue;
            }
            if anchors.insert(ancestor) {
                debug!("Added {} to anchors as ancestor of {}", ancestor, anchor);
            }
        }
    }
}

/// Drop continent anchors that contain one of the country anchors.
pub fn prune_continents(anchors: &mut Anchors) {
    let countries: Vec<Location> = anchors
        .iter()
        .filter(|l| l.location_type() == LocationType::Country)
        .cloned()
        .collect();
    if countries.is_empty() {
        return;
    }
    anchors.retain(|l| {
        l.location_type() != LocationType::Continent || !countries.iter().any(|c| c.descendant_of(l))
    });
}

/// Lasso heuristic: repeatedly drop the located candidate farthest from the
/// midpoint until everything lies within `lasso_distance_km`.
///
/// Succeeds only if at least two differently named locations remain; those
/// plus the candidates they descend from are returned.
pub fn lasso(candidates: &CandidateMap, config: &DisambiguationConfig) -> Vec<Location> {
    let all = candidates.all_locations();
    let mut remaining: Vec<&Location> = all.clone();

    while remaining.len() > 1 {
        let Some(center) = geo::midpoint(remaining.iter().map(|l| l.coordinate())) else {
            break;
        };
        let mut farthest: Option<(usize, f64)> = None;
        for (index, location) in remaining.iter().enumerate() {
            if let Some(c) = location.coordinate() {
                let distance = c.distance(&center);
                if farthest.map_or(true, |(_, d)| distance > d) {
                    farthest = Some((index, distance));
                }
            }
        }
        match farthest {
            Some((index, distance)) if distance >= config.lasso_distance_km => {
                let removed = remaining.remove(index);
                debug!(
                    "Lasso removed {}, {:.1} km from center, {} left",
                    removed,
                    distance,
                    remaining.len()
                );
            }
            _ => break,
        }
    }

    let distinct_names: HashSet<String> = remaining.iter().map(|l| fold_key(l.primary_name())).collect();
    if remaining.len() < 2 || distinct_names.len() < 2 {
        debug!("Could not identify lasso locations");
        return Vec::new();
    }

    let mut result: Anchors = remaining.iter().copied().collect();
    for location in &remaining {
        for other in &all {
            if location.descendant_of(other) {
                result.insert(other);
            }
        }
    }
    debug!("Identified {} locations via lasso", result.len());
    result.iter().cloned().collect()
}

/// Whether the candidates of this group are spread out beyond `same_distance_km`.
pub fn is_ambiguous_group(group: &[Location], config: &DisambiguationConfig) -> bool {
    let located: Vec<Location> = located_or_all(group).into_iter().cloned().collect();
    group_spread(&located) >= config.same_distance_km
}
