//! Two-pass hierarchy-backed anchoring.
//!
//! Pass one collects anchors: continents, countries, very populous places and
//! long unambiguous names. Pass two promotes the anchors' ancestor chains to
//! anchors as well, filters every ambiguous group down to candidates inside
//! the anchored hierarchy, and ranks the survivors. A final sweep withdraws
//! small isolated selections nothing else in the document corroborates.

use std::collections::HashMap;

use tracing::debug;

use super::ranking::select_location;
use super::{Disambiguation, Document};
use crate::anchors::{self, biggest, located_or_all, Anchors};
use crate::config::DisambiguationConfig;
use crate::geo::EARTH_MAX_DISTANCE_KM;
use crate::models::{CandidateMap, Location, LocationAnnotation, LocationType};
use crate::normalize::token_count;

pub struct HierarchyAnchoring {
    config: DisambiguationConfig,
}

impl HierarchyAnchoring {
    pub fn new(config: DisambiguationConfig) -> Self {
        Self { config }
    }

    fn first_pass(&self, candidates: &CandidateMap) -> Anchors {
        let mut found = Anchors::new();
        for location in candidates.all_locations() {
            if location.location_type().is_top_level()
                || location.population_or_zero() > self.config.hierarchy_anchor_population
            {
                found.insert(location);
            }
        }
        for (name, group) in candidates.iter() {
            if anchors::is_ambiguous_group(group, &self.config) || token_count(name) < self.config.token_threshold {
                continue;
            }
            let group = located_or_all(group);
            if let Some(location) = biggest(group.iter().copied()).or(group.first().copied()) {
                found.insert(location);
            }
        }
        if found.is_empty() {
            if let Some(location) = biggest(candidates.all_locations()) {
                debug!("No anchor found, took biggest location: {}", location);
                found.insert(location);
            }
        }
        found
    }

    /// Candidates of an ambiguous group that fit the anchored hierarchy.
    fn hierarchy_filter<'a>(group: &'a [Location], anchors: &Anchors) -> Vec<&'a Location> {
        group
            .iter()
            .filter(|l| {
                l.ancestor_ids().is_empty()
                    || anchors.contains(l)
                    || l.location_type() == LocationType::Continent
                    || anchors.iter().any(|a| l.descendant_of(a))
            })
            .collect()
    }

    fn is_outlier_candidate(&self, location: &Location, anchors: &Anchors) -> bool {
        !matches!(
            location.location_type(),
            LocationType::Continent | LocationType::Country | LocationType::Region
        ) && !anchors.contains(location)
            && location.population().map_or(true, |p| p < self.config.outlier_population)
    }

    /// Remove small, non-anchor selections farther than `outlier_distance_km`
    /// from every other selection.
    fn remove_outliers(&self, selections: &mut HashMap<String, Location>, anchors: &Anchors) {
        let snapshot: Vec<Location> = selections.values().cloned().collect();
        selections.retain(|name, location| {
            if !self.is_outlier_candidate(location, anchors) {
                return true;
            }
            let nearest = snapshot
                .iter()
                .filter(|other| other.id() != location.id())
                .map(|other| location.distance(other))
                .fold(EARTH_MAX_DISTANCE_KM, f64::min);
            if nearest > self.config.outlier_distance_km {
                debug!("Removing outlier {} for '{}', nearest selection {:.1} km", location, name, nearest);
                false
            } else {
                true
            }
        });
    }
}

impl Disambiguation for HierarchyAnchoring {
    fn disambiguate(&self, document: &Document<'_>) -> Vec<LocationAnnotation> {
        let mut anchors = self.first_pass(document.candidates);
        anchors::expand_with_ancestors(&mut anchors, document.ancestors, &self.config.root_name);
        anchors::prune_continents(&mut anchors);
        debug!("{} anchors after expansion", anchors.len());

        let mut selections: HashMap<String, Location> = HashMap::new();
        for (name, group) in document.candidates.iter() {
            let preselection: Vec<&Location> = if anchors::is_ambiguous_group(group, &self.config) {
                Self::hierarchy_filter(group, &anchors)
            } else {
                group.iter().collect()
            };
            if preselection.is_empty() {
                debug!("No candidate of '{}' fits the anchored hierarchy", name);
                continue;
            }
            if let Some(location) = select_location(&preselection, &self.config) {
                selections.insert(name.to_string(), location.clone());
            }
        }

        self.remove_outliers(&mut selections, &anchors);
        document.annotate(&selections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disambiguation::fixtures::*;
    use crate::models::AncestorIndex;
    use crate::normalize::Normalizer;

    fn hierarchy() -> AncestorIndex {
        vec![
            Location::new(0, "Earth", LocationType::Region),
            Location::new(1, "North America", LocationType::Continent).with_ancestors(vec![0]),
            loc(2, "United States", LocationType::Country, 39.83, -98.58, None).with_ancestors(vec![1, 0]),
            loc(3, "Illinois", LocationType::Unit, 40.0, -89.0, Some(12_800_000)).with_ancestors(vec![2, 1, 0]),
            loc(4, "Massachusetts", LocationType::Unit, 42.3, -71.8, Some(7_000_000)).with_ancestors(vec![2, 1, 0]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_ancestor_anchor_filters_group() {
        let text = "Springfield, the capital of Illinois";
        let mut candidates = CandidateMap::new();
        candidates.insert("Springfield", vec![
            // Springfield, Ontario; Canada is not anchored
            loc(20, "Springfield", LocationType::City, 42.83, -80.93, Some(155_000)).with_ancestors(vec![5, 6, 1, 0]),
            loc(21, "Springfield", LocationType::City, 39.80, -89.64, Some(114_000)).with_ancestors(vec![3, 2, 1, 0]),
        ]);
        candidates.insert("Illinois", vec![
            loc(3, "Illinois", LocationType::Unit, 40.0, -89.0, Some(12_800_000)).with_ancestors(vec![2, 1, 0]),
        ]);
        let ancestors = hierarchy();
        let document = Document::new(
            text,
            &spans(text, &["Springfield", "Illinois"]),
            &candidates,
            &ancestors,
            &Normalizer::default(),
        );

        let result = HierarchyAnchoring::new(DisambiguationConfig::default()).disambiguate(&document);
        assert_eq!(
            selected(&result),
            vec![("Springfield".to_string(), 21), ("Illinois".to_string(), 3)]
        );
    }

    #[test]
    fn test_isolated_small_place_withdrawn() {
        let text = "Paris and Smalltown";
        let mut candidates = CandidateMap::new();
        candidates.insert("Paris", vec![loc(1, "Paris", LocationType::City, 48.85, 2.35, Some(2_100_000))]);
        candidates.insert("Smalltown", vec![loc(2, "Smalltown", LocationType::City, -33.0, 151.0, Some(800))]);
        let ancestors = AncestorIndex::new();
        let document = Document::new(
            text,
            &spans(text, &["Paris", "Smalltown"]),
            &candidates,
            &ancestors,
            &Normalizer::default(),
        );

        let result = HierarchyAnchoring::new(DisambiguationConfig::default()).disambiguate(&document);
        assert_eq!(selected(&result), vec![("Paris".to_string(), 1)]);
    }

    #[test]
    fn test_corroborated_small_place_kept() {
        let text = "Paris and Petitville";
        let mut candidates = CandidateMap::new();
        candidates.insert("Paris", vec![loc(1, "Paris", LocationType::City, 48.85, 2.35, Some(2_100_000))]);
        candidates.insert("Petitville", vec![loc(2, "Petitville", LocationType::City, 48.95, 2.50, None)]);
        let ancestors = AncestorIndex::new();
        let document = Document::new(
            text,
            &spans(text, &["Paris", "Petitville"]),
            &candidates,
            &ancestors,
            &Normalizer::default(),
        );

        let result = HierarchyAnchoring::new(DisambiguationConfig::default()).disambiguate(&document);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_candidates_without_hierarchy_are_kept() {
        let text = "Lone Pine";
        let mut candidates = CandidateMap::new();
        candidates.insert("Lone Pine", vec![
            loc(1, "Lone Pine", LocationType::City, 36.6, -118.06, Some(2_000)),
            loc(2, "Lone Pine", LocationType::City, -27.5, 152.9, Some(60_000)),
        ]);
        let ancestors = AncestorIndex::new();
        let document = Document::new(text, &spans(text, &["Lone Pine"]), &candidates, &ancestors, &Normalizer::default());

        // both pass the filter, ranking keeps the bigger one
        let result = HierarchyAnchoring::new(DisambiguationConfig::default()).disambiguate(&document);
        assert_eq!(selected(&result), vec![("Lone Pine".to_string(), 2)]);
    }
}
