//! Feature vectors for (span, candidate) pairs.
//!
//! Feature names follow a `name` or `name(argument)` scheme, e.g.
//! `population`, `numLocIn(50)` or `locationType(CITY)`. Categorical values
//! are one-hot encoded. Spatial features consider the candidates of every
//! *other* name in the document.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::Document;
use crate::anchors::is_ambiguous_group;
use crate::config::DisambiguationConfig;
use crate::context::{CategoryProbabilities, Category, ContextModel};
use crate::geo::{largest_distance, EARTH_MAX_DISTANCE_KM};
use crate::models::{Location, LocationId, LocationType, Span};
use crate::normalize::{fold_key, token_count};

/// Radii (km) for the spatial density features.
pub const RADII_KM: [f64; 4] = [10.0, 50.0, 100.0, 250.0];

const POPULATION_THRESHOLDS: [u64; 3] = [10_000, 100_000, 1_000_000];

const DEFAULT_MARKERS: &[&str] = &[
    "city", "town", "village", "municipality", "county", "district", "province", "state", "region",
    "country", "capital", "island", "lake", "river", "mount", "valley", "bay",
];

static ACRONYM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[A-Z]+|(?:[A-Z]\.)+)$").expect("valid regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+").expect("valid regex"));
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("valid regex"));

/// Named numeric features; unset features read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    fn flag(&mut self, name: &str, value: bool) {
        self.set(name, if value { 1.0 } else { 0.0 });
    }

    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds feature vectors for every candidate of every span in a document.
pub struct FeatureExtractor {
    config: DisambiguationConfig,
    context: Option<Arc<ContextModel>>,
    markers: HashSet<String>,
}

/// Document-wide values shared by all spans.
struct DocumentFeatures<'d> {
    all: Vec<&'d Location>,
    /// Ids of candidates whose group is unambiguous
    unique: HashSet<LocationId>,
    sentence_ends: Vec<usize>,
}

impl FeatureExtractor {
    pub fn new(config: DisambiguationConfig, context: Option<Arc<ContextModel>>) -> Self {
        Self {
            config,
            context,
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Replace the location marker words.
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.markers = markers.into_iter().map(|m| m.as_ref().to_lowercase()).collect();
        self
    }

    /// One vector per candidate, aligned with [`Document::spans`] and
    /// [`Document::candidates_of`].
    pub fn extract(&self, document: &Document<'_>) -> Vec<Vec<FeatureVector>> {
        let mut unique = HashSet::new();
        for (_, group) in document.candidates.iter() {
            if !is_ambiguous_group(group, &self.config) {
                unique.extend(group.iter().map(Location::id));
            }
        }
        let shared = DocumentFeatures {
            all: document.candidates.all_locations(),
            unique,
            sentence_ends: SENTENCE_END.find_iter(document.text).map(|m| m.end()).collect(),
        };

        (0..document.spans().len())
            .map(|index| {
                let group = document.candidates_of(index);
                let name = document.name_of(index).unwrap_or_default();
                if group.is_empty() {
                    return Vec::new();
                }
                let span_features = self.span_features(document, index, group);
                let others = self.other_locations(document, index);
                let same_sentence = self.sentence_neighbours(document, &shared, index);
                group
                    .iter()
                    .map(|candidate| {
                        let mut features = span_features.clone();
                        self.candidate_features(&mut features, name, candidate, group, &others, &shared);
                        for radius in RADII_KM {
                            let near = same_sentence.iter().any(|o| candidate.distance(o) < radius);
                            features.flag(&format!("locSentence({})", radius), near);
                        }
                        features
                    })
                    .collect()
            })
            .collect()
    }

    /// Features that depend on the span only.
    fn span_features(&self, document: &Document<'_>, index: usize, group: &[Location]) -> FeatureVector {
        let span = &document.spans()[index];
        let mut features = FeatureVector::new();

        features.set("numCharacters", span.value.chars().count() as f64);
        features.set("numTokens", token_count(&span.value) as f64);
        features.flag("acronym", ACRONYM.is_match(&span.value));
        features.flag(&format!("caseSignature({})", case_signature(&span.value)), true);

        let mut any_marker = false;
        for word in neighbour_words(document.text, span) {
            if self.markers.contains(&word) {
                features.flag(&format!("marker({})", word), true);
                any_marker = true;
            }
        }
        features.flag("marker(*)", any_marker);

        features.set("nameAmbiguity", 1.0 / group.len() as f64);
        let coordinates: Vec<_> = group.iter().map(Location::coordinate).collect();
        features.set("geoDiversity", largest_distance(&coordinates));
        features.flag("unique", !is_ambiguous_group(group, &self.config));

        let probabilities = match &self.context {
            Some(model) => model.classify(document.text, span),
            None => CategoryProbabilities::uniform(),
        };
        for category in Category::ALL {
            features.set(&format!("category({})", category.as_str()), probabilities.get(category));
        }
        features
    }

    fn candidate_features(
        &self,
        features: &mut FeatureVector,
        name: &str,
        candidate: &Location,
        group: &[Location],
        others: &[&Location],
        shared: &DocumentFeatures<'_>,
    ) {
        let population = candidate.population_or_zero();
        let max_population = group.iter().map(Location::population_or_zero).max().unwrap_or(0);
        features.set("population", population as f64);
        features.set(
            "populationNorm",
            if max_population == 0 { 0.0 } else { population as f64 / max_population as f64 },
        );
        features.set("populationMagnitude", (population as f64 + 1.0).log10());
        features.set("hierarchyDepth", candidate.depth() as f64);
        for location_type in LocationType::ALL {
            features.flag(
                &format!("locationType({})", location_type),
                candidate.location_type() == location_type,
            );
        }
        features.flag("primaryName", fold_key(candidate.primary_name()) == fold_key(name));
        features.flag("leaf", !shared.all.iter().any(|l| l.descendant_of(candidate)));

        let relations: [(&str, &dyn Fn(&Location) -> bool); 5] = [
            ("ancestor", &|o: &Location| candidate.descendant_of(o)),
            ("descendant", &|o: &Location| o.descendant_of(candidate)),
            ("parent", &|o: &Location| candidate.child_of(o)),
            ("child", &|o: &Location| o.child_of(candidate)),
            ("sibling", &|o: &Location| candidate.sibling_of(o)),
        ];
        for (relation, holds) in relations {
            let count = others.iter().filter(|&&o| holds(o)).count();
            features.set(&format!("num({})", relation), count as f64);
            features.flag(&format!("contains({})", relation), count > 0);
        }

        for (feature, location_type) in [
            ("inContinent", LocationType::Continent),
            ("inCountry", LocationType::Country),
            ("inUnit", LocationType::Unit),
        ] {
            let inside = others
                .iter()
                .any(|o| o.location_type() == location_type && candidate.descendant_of(o));
            features.flag(feature, inside);
        }

        for radius in RADII_KM {
            let near: Vec<&&Location> = others.iter().filter(|o| candidate.distance(o) < radius).collect();
            features.set(&format!("numLocIn({})", radius), near.len() as f64);
            features.set(
                &format!("popIn({})", radius),
                near.iter().map(|o| o.population_or_zero() as f64).sum(),
            );
            features.set(
                &format!("uniqueIn({})", radius),
                near.iter().filter(|o| shared.unique.contains(&o.id())).count() as f64,
            );
        }

        for threshold in POPULATION_THRESHOLDS {
            let nearest = others
                .iter()
                .filter(|o| o.population_or_zero() >= threshold)
                .map(|o| candidate.distance(o))
                .fold(EARTH_MAX_DISTANCE_KM, f64::min);
            features.set(&format!("distLoc({})", threshold), nearest);
        }
    }

    /// Candidates of every name other than the span's own, without the
    /// span's own candidates.
    fn other_locations<'d>(&self, document: &Document<'d>, index: usize) -> Vec<&'d Location> {
        let own: HashSet<LocationId> = document.candidates_of(index).iter().map(Location::id).collect();
        document
            .candidates
            .all_locations()
            .into_iter()
            .filter(|l| !own.contains(&l.id()))
            .collect()
    }

    /// Candidates of differently named spans in the same sentence.
    fn sentence_neighbours<'d>(
        &self,
        document: &Document<'d>,
        shared: &DocumentFeatures<'d>,
        index: usize,
    ) -> Vec<&'d Location> {
        let spans = document.spans();
        let sentence = sentence_of(&shared.sentence_ends, spans[index].start);
        let own = fold_key(document.name_of(index).unwrap_or_default());
        let mut seen = HashSet::new();
        let mut neighbours = Vec::new();
        for (other, (span, name)) in document.named_spans().enumerate() {
            if other == index
                || fold_key(name) == own
                || sentence_of(&shared.sentence_ends, span.start) != sentence
            {
                continue;
            }
            for location in document.candidates_of(other) {
                if seen.insert(location.id()) {
                    neighbours.push(location);
                }
            }
        }
        neighbours
    }
}

/// Index of the sentence containing byte offset `offset`.
fn sentence_of(sentence_ends: &[usize], offset: usize) -> usize {
    sentence_ends.partition_point(|&end| end <= offset)
}

/// Runs of uppercase, lowercase, digits and other characters, collapsed:
/// `"New York"` -> `"Aa Aa"`, `"A1"` -> `"A0"`.
pub fn case_signature(value: &str) -> String {
    let mut signature = String::new();
    for c in value.chars() {
        let class = if c.is_uppercase() {
            'A'
        } else if c.is_lowercase() {
            'a'
        } else if c.is_numeric() {
            '0'
        } else if c.is_whitespace() {
            ' '
        } else {
            '-'
        };
        if !signature.ends_with(class) {
            signature.push(class);
        }
    }
    signature
}

/// Lowercase word directly before and directly after the span.
fn neighbour_words(text: &str, span: &Span) -> Vec<String> {
    let mut words = Vec::new();
    if let Some(left) = text.get(..span.start) {
        if let Some(word) = WORD.find_iter(left).last() {
            words.push(word.as_str().to_lowercase());
        }
    }
    if let Some(right) = text.get(span.end..) {
        if let Some(word) = WORD.find(right) {
            words.push(word.as_str().to_lowercase());
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disambiguation::fixtures::*;
    use crate::models::{AncestorIndex, CandidateMap};
    use crate::normalize::Normalizer;

    fn springfield_candidates() -> CandidateMap {
        let mut candidates = CandidateMap::new();
        candidates.insert("Springfield", vec![
            loc(21, "Springfield", LocationType::City, 39.80, -89.64, Some(114_000)).with_ancestors(vec![3]),
            loc(20, "Springfield", LocationType::City, 42.83, -80.93, Some(2_000)).with_ancestors(vec![5]),
        ]);
        candidates.insert("Illinois", vec![
            loc(3, "Illinois", LocationType::Unit, 40.0, -89.0, Some(12_800_000)),
        ]);
        candidates
    }

    #[test]
    fn test_case_signature() {
        assert_eq!(case_signature("New York"), "Aa Aa");
        assert_eq!(case_signature("U.S."), "A-A-");
        assert_eq!(case_signature("A1"), "A0");
    }

    #[test]
    fn test_candidate_features() {
        let text = "Springfield city lies in Illinois.";
        let candidates = springfield_candidates();
        let ancestors = AncestorIndex::new();
        let document = Document::new(
            text,
            &spans(text, &["Springfield", "Illinois"]),
            &candidates,
            &ancestors,
            &Normalizer::default(),
        );
        let vectors = FeatureExtractor::new(DisambiguationConfig::default(), None).extract(&document);
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 2);

        let near = &vectors[0][0];
        assert_eq!(near.get("numCharacters"), 11.0);
        assert_eq!(near.get("nameAmbiguity"), 0.5);
        assert_eq!(near.get("unique"), 0.0);
        assert_eq!(near.get("caseSignature(Aa)"), 1.0);
        assert_eq!(near.get("marker(city)"), 1.0);
        assert_eq!(near.get("marker(*)"), 1.0);
        assert_eq!(near.get("locationType(CITY)"), 1.0);
        assert_eq!(near.get("locationType(UNIT)"), 0.0);
        assert_eq!(near.get("contains(parent)"), 1.0);
        assert_eq!(near.get("inUnit"), 1.0);
        assert_eq!(near.get("primaryName"), 1.0);
        assert_eq!(near.get("leaf"), 1.0);
        assert_eq!(near.get("populationNorm"), 1.0);
        assert_eq!(near.get("numLocIn(10)"), 0.0);
        assert_eq!(near.get("numLocIn(100)"), 1.0);
        assert_eq!(near.get("popIn(100)"), 12_800_000.0);
        assert_eq!(near.get("uniqueIn(100)"), 1.0);
        assert_eq!(near.get("locSentence(100)"), 1.0);
        assert_eq!(near.get("category(LOC)"), 0.25);

        let far = &vectors[0][1];
        assert_eq!(far.get("contains(parent)"), 0.0);
        assert_eq!(far.get("inUnit"), 0.0);
        assert_eq!(far.get("numLocIn(250)"), 0.0);
        assert_eq!(far.get("locSentence(250)"), 0.0);
        assert!(far.get("distLoc(1000000)") > 700.0);

        let illinois = &vectors[1][0];
        assert_eq!(illinois.get("leaf"), 0.0);
        assert_eq!(illinois.get("num(child)"), 1.0);
        assert_eq!(illinois.get("contains(descendant)"), 1.0);
        assert_eq!(illinois.get("unique"), 1.0);
    }

    #[test]
    fn test_sentence_boundaries_limit_proximity() {
        let text = "Springfield is nice. Illinois is big.";
        let candidates = springfield_candidates();
        let ancestors = AncestorIndex::new();
        let document = Document::new(
            text,
            &spans(text, &["Springfield", "Illinois"]),
            &candidates,
            &ancestors,
            &Normalizer::default(),
        );
        let vectors = FeatureExtractor::new(DisambiguationConfig::default(), None)
            .with_markers(["Lake"])
            .extract(&document);
        assert_eq!(vectors[0][0].get("locSentence(250)"), 0.0);
        // document-wide density still sees Illinois
        assert_eq!(vectors[0][0].get("numLocIn(250)"), 1.0);
        assert_eq!(vectors[0][0].get("marker(*)"), 0.0);
    }

    #[test]
    fn test_spans_without_candidates_get_no_vectors() {
        let text = "Atlantis";
        let candidates = CandidateMap::new();
        let ancestors = AncestorIndex::new();
        let document = Document::new(text, &spans(text, &["Atlantis"]), &candidates, &ancestors, &Normalizer::default());
        let vectors = FeatureExtractor::new(DisambiguationConfig::default(), None).extract(&document);
        assert_eq!(vectors, vec![Vec::<FeatureVector>::new()]);
    }
}
