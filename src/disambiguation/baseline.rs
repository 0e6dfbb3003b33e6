//! Population heuristic without geography.

use std::collections::HashMap;

use tracing::debug;

use super::{Disambiguation, Document};
use crate::models::{Location, LocationAnnotation};

/// Picks the first continent or country, else the most populous candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Baseline;

impl Baseline {
    pub fn new() -> Self {
        Self
    }

    /// Choice for one candidate group; earliest candidate wins ties.
    pub fn select(group: &[Location]) -> Option<&Location> {
        if let Some(top) = group.iter().find(|l| l.location_type().is_top_level()) {
            return Some(top);
        }
        let mut best: Option<&Location> = None;
        for location in group {
            if best.map_or(true, |b| location.population_or_zero() > b.population_or_zero()) {
                best = Some(location);
            }
        }
        best
    }
}

impl Disambiguation for Baseline {
    fn disambiguate(&self, document: &Document<'_>) -> Vec<LocationAnnotation> {
        let selections: HashMap<String, Location> = document
            .candidates
            .iter()
            .filter_map(|(name, group)| {
                let selected = Self::select(group)?;
                debug!("Baseline selected {} for '{}'", selected, name);
                Some((name.to_string(), selected.clone()))
            })
            .collect();
        document.annotate(&selections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disambiguation::fixtures::*;
    use crate::models::{AncestorIndex, CandidateMap, LocationType};
    use crate::normalize::Normalizer;

    #[test]
    fn test_population_wins() {
        let text = "Paris is lovely.";
        let mut candidates = CandidateMap::new();
        candidates.insert("Paris", vec![
            loc(2, "Paris", LocationType::City, 33.66, -95.55, Some(25_000)),
            loc(1, "Paris", LocationType::City, 48.85, 2.35, Some(2_100_000)),
        ]);
        let ancestors = AncestorIndex::new();
        let document = Document::new(text, &spans(text, &["Paris"]), &candidates, &ancestors, &Normalizer::default());
        assert_eq!(selected(&Baseline::new().disambiguate(&document)), vec![("Paris".to_string(), 1)]);
    }

    #[test]
    fn test_country_beats_population() {
        let group = vec![
            loc(1, "Georgia", LocationType::Unit, 32.6, -83.4, Some(10_700_000)),
            loc(2, "Georgia", LocationType::Country, 42.3, 43.4, Some(3_700_000)),
        ];
        assert_eq!(Baseline::select(&group).unwrap().id(), 2);
    }

    #[test]
    fn test_unknown_population_keeps_first() {
        let group = vec![
            Location::new(1, "Lonely", LocationType::City),
            Location::new(2, "Lonely", LocationType::City),
        ];
        assert_eq!(Baseline::select(&group).unwrap().id(), 1);
        assert!(Baseline::select(&[]).is_none());
    }

    #[test]
    fn test_span_without_candidates_dropped() {
        let text = "From Paris to Atlantis";
        let mut candidates = CandidateMap::new();
        candidates.insert("Paris", vec![loc(1, "Paris", LocationType::City, 48.85, 2.35, None)]);
        let ancestors = AncestorIndex::new();
        let document = Document::new(
            text,
            &spans(text, &["Paris", "Atlantis"]),
            &candidates,
            &ancestors,
            &Normalizer::default(),
        );
        let result = Baseline::new().disambiguate(&document);
        assert_eq!(selected(&result), vec![("Paris".to_string(), 1)]);
    }
}
