//! Feature-scored classification.

use std::sync::Arc;

use tracing::debug;

use super::features::FeatureExtractor;
use super::scorer::Scorer;
use super::{Disambiguation, Document};
use crate::config::DisambiguationConfig;
use crate::context::ContextModel;
use crate::models::LocationAnnotation;

/// Scores every candidate with a trained model and keeps the best one per
/// span if it reaches `score_threshold`.
pub struct FeatureScored {
    extractor: FeatureExtractor,
    scorer: Arc<dyn Scorer>,
    threshold: f64,
}

impl FeatureScored {
    pub fn new(config: DisambiguationConfig, scorer: Arc<dyn Scorer>, context: Option<Arc<ContextModel>>) -> Self {
        let threshold = config.score_threshold;
        Self {
            extractor: FeatureExtractor::new(config, context),
            scorer,
            threshold,
        }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }
}

impl Disambiguation for FeatureScored {
    fn disambiguate(&self, document: &Document<'_>) -> Vec<LocationAnnotation> {
        let vectors = self.extractor.extract(document);
        let mut annotations = Vec::new();

        for (index, span) in document.spans().iter().enumerate() {
            let group = document.candidates_of(index);
            let mut best: Option<(usize, f64)> = None;
            for (candidate, features) in vectors[index].iter().enumerate() {
                let score = self.scorer.score(features);
                if score > best.map_or(0.0, |(_, s)| s) {
                    best = Some((candidate, score));
                }
            }
            match best {
                Some((candidate, score)) if score >= self.threshold => {
                    debug!("'{}' resolved to {} with score {:.3}", span.value, group[candidate], score);
                    annotations.push(LocationAnnotation::new(span.clone(), group[candidate].clone()));
                }
                Some((_, score)) => debug!("Best score {:.3} for '{}' below threshold", score, span.value),
                None => {}
            }
        }
        annotations
    }
}
