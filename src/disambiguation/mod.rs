//! Disambiguation strategies.
//!
//! Every strategy maps a [`Document`] (text, spans, candidate groups and
//! resolved ancestors) to at most one [`LocationAnnotation`] per span. Spans
//! without candidates, or without a selected candidate, are left out.
//! Strategies are pure: the same document always yields the same output.

pub mod baseline;
pub mod features;
pub mod hierarchy;
pub mod proximity;
pub mod ranking;
pub mod scored;
pub mod scorer;

use std::collections::HashMap;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::config::{DisambiguationConfig, StrategyKind};
use crate::context::ContextModel;
use crate::error::{Error, Result};
use crate::models::{AncestorIndex, CandidateMap, Location, LocationAnnotation, Span};
use crate::normalize::{fold_key, Normalizer};

pub use baseline::Baseline;
pub use features::{FeatureExtractor, FeatureVector};
pub use hierarchy::HierarchyAnchoring;
pub use proximity::Proximity;
pub use scored::FeatureScored;
pub use scorer::{Scorer, TreeEnsemble, TreeNode};

/// Everything a strategy sees of one document.
#[derive(Debug)]
pub struct Document<'a> {
    pub text: &'a str,
    pub candidates: &'a CandidateMap,
    pub ancestors: &'a AncestorIndex,
    spans: Vec<Span>,
    names: Vec<String>,
}

impl<'a> Document<'a> {
    /// Build a document; repeated spans (same range) are kept once.
    pub fn new(
        text: &'a str,
        spans: &[Span],
        candidates: &'a CandidateMap,
        ancestors: &'a AncestorIndex,
        normalizer: &Normalizer,
    ) -> Self {
        let mut seen = HashSet::new();
        let spans: Vec<Span> = spans
            .iter()
            .filter(|s| seen.insert((s.start, s.end)))
            .cloned()
            .collect();
        let names = spans.iter().map(|s| normalizer.normalize(&s.value)).collect();
        Self {
            text,
            candidates,
            ancestors,
            spans,
            names,
        }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Spans paired with their normalized names.
    pub fn named_spans(&self) -> impl Iterator<Item = (&Span, &str)> {
        self.spans.iter().zip(self.names.iter().map(String::as_str))
    }

    /// Normalized name of the span at `index`.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Candidates of the span at `index`.
    pub fn candidates_of(&self, index: usize) -> &'a [Location] {
        self.names
            .get(index)
            .map(|name| self.candidates.get(name))
            .unwrap_or(&[])
    }

    /// Annotate every span whose group has a selection.
    ///
    /// `selections` is keyed by folded name, so all spans sharing a name get
    /// the same location.
    pub(crate) fn annotate(&self, selections: &HashMap<String, Location>) -> Vec<LocationAnnotation> {
        self.named_spans()
            .filter_map(|(span, name)| {
                selections
                    .get(&fold_key(name))
                    .map(|location| LocationAnnotation::new(span.clone(), location.clone()))
            })
            .collect()
    }
}

/// Common contract of all strategies.
pub trait Disambiguation: Send + Sync {
    fn disambiguate(&self, document: &Document<'_>) -> Vec<LocationAnnotation>;
}

/// The configured strategy.
pub enum Strategy {
    Baseline(Baseline),
    Proximity(Proximity),
    Hierarchy(HierarchyAnchoring),
    FeatureScored(FeatureScored),
}

impl Strategy {
    /// Build the strategy named by `kind`.
    ///
    /// The feature-scored strategy needs a scorer and fails with
    /// [`Error::MissingModel`] without one. The context model is optional
    /// everywhere.
    pub fn from_config(
        kind: StrategyKind,
        config: DisambiguationConfig,
        scorer: Option<Arc<dyn Scorer>>,
        context: Option<Arc<ContextModel>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(match kind {
            StrategyKind::Baseline => Strategy::Baseline(Baseline::new()),
            StrategyKind::Proximity => Strategy::Proximity(Proximity::new(config, context)),
            StrategyKind::Hierarchy => Strategy::Hierarchy(HierarchyAnchoring::new(config)),
            StrategyKind::FeatureScored => {
                let scorer = scorer.ok_or(Error::MissingModel("scorer model"))?;
                Strategy::FeatureScored(FeatureScored::new(config, scorer, context))
            }
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Baseline(_) => StrategyKind::Baseline,
            Strategy::Proximity(_) => StrategyKind::Proximity,
            Strategy::Hierarchy(_) => StrategyKind::Hierarchy,
            Strategy::FeatureScored(_) => StrategyKind::FeatureScored,
        }
    }
}

impl Disambiguation for Strategy {
    fn disambiguate(&self, document: &Document<'_>) -> Vec<LocationAnnotation> {
        match self {
            Strategy::Baseline(s) => s.disambiguate(document),
            Strategy::Proximity(s) => s.disambiguate(document),
            Strategy::Hierarchy(s) => s.disambiguate(document),
            Strategy::FeatureScored(s) => s.disambiguate(document),
        }
    }
}
