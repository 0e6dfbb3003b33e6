//! Anchor-and-proximity clustering.

use std::collections::HashMap;
use std::sync::Arc;

use hashbrown::HashSet;
use tracing::debug;

use super::ranking::select_location;
use super::{Disambiguation, Document};
use crate::anchors::{select_anchors, Anchors};
use crate::config::DisambiguationConfig;
use crate::context::{Category, ContextModel};
use crate::models::{Location, LocationAnnotation, LocationType};
use crate::normalize::fold_key;

/// Keeps candidates that are anchors, lie near an anchor, or sit inside an
/// anchor's administrative area, then ranks the survivors.
pub struct Proximity {
    config: DisambiguationConfig,
    context: Option<Arc<ContextModel>>,
}

impl Proximity {
    pub fn new(config: DisambiguationConfig, context: Option<Arc<ContextModel>>) -> Self {
        Self { config, context }
    }

    /// Candidates of `group` supported by the anchors. Anchors from the group
    /// itself do not count as support for their siblings.
    fn preselect<'a>(&self, group: &'a [Location], anchors: &Anchors) -> Vec<&'a Location> {
        let current: Vec<&Location> = anchors
            .iter()
            .filter(|a| !group.iter().any(|l| l.id() == a.id()))
            .collect();

        group
            .iter()
            .filter(|candidate| {
                anchors.contains(candidate)
                    || current.iter().any(|anchor| {
                        candidate.distance(anchor) < self.config.anchor_distance_km
                            || (matches!(
                                anchor.location_type(),
                                LocationType::City | LocationType::Unit | LocationType::Country
                            ) && candidate.descendant_of(anchor)
                                && candidate.population_or_zero() > self.config.lower_population)
                    })
            })
            .collect()
    }

    /// A span reading like a person's name is dropped unless its candidates
    /// include something too prominent to ignore.
    fn unlikely_location(&self, model: &ContextModel, document: &Document<'_>, index: usize) -> bool {
        let span = &document.spans()[index];
        if model.classify(document.text, span).most_likely() != Category::Per {
            return false;
        }
        let group = document.candidates_of(index);
        let prominent = group.iter().any(|l| {
            l.location_type().is_top_level() || l.population_or_zero() > self.config.unlikely_population
        });
        !prominent
    }
}

impl Disambiguation for Proximity {
    fn disambiguate(&self, document: &Document<'_>) -> Vec<LocationAnnotation> {
        let unlikely: Vec<bool> = (0..document.spans().len())
            .map(|index| match &self.context {
                Some(model) => self.unlikely_location(model, document, index),
                None => false,
            })
            .collect();

        // names whose every span reads as a person take no part in anchoring
        let mut kept_names: HashSet<String> = HashSet::new();
        for (index, (_, name)) in document.named_spans().enumerate() {
            if !unlikely[index] {
                kept_names.insert(fold_key(name));
            }
        }
        let mut candidates = document.candidates.clone();
        candidates.retain(|name, _| kept_names.contains(name));

        let anchors = select_anchors(&candidates, &self.config);
        debug!("{} anchors: {:?}", anchors.len(), anchors.iter().map(|a| a.id()).collect::<Vec<_>>());

        let mut selections: HashMap<String, Location> = HashMap::new();
        for (name, group) in candidates.iter() {
            let preselection = self.preselect(group, &anchors);
            if preselection.is_empty() {
                debug!("No candidate of '{}' is supported by an anchor", name);
                continue;
            }
            if let Some(location) = select_location(&preselection, &self.config) {
                debug!("Selected {} for '{}' out of {}", location, name, preselection.len());
                selections.insert(name.to_string(), location.clone());
            }
        }

        let mut annotations = Vec::new();
        for (index, (span, name)) in document.named_spans().enumerate() {
            if unlikely[index] {
                debug!("Dropping '{}' at {}, context suggests a person", span.value, span.start);
                continue;
            }
            let Some(location) = selections.get(&fold_key(name)) else {
                continue;
            };
            annotations.push(LocationAnnotation::new(span.clone(), location.clone()));
        }
        annotations
    }
}
