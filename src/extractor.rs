//! Per-document location extraction pipeline.
//!
//! validate spans -> normalize names -> batched lookup -> (ancestor
//! resolution) -> disambiguation -> coordinate tagging -> assembly.

use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assembly::assemble;
use crate::config::{EngineConfig, StrategyKind};
use crate::context::ContextModel;
use crate::coordinates::CoordinateTagger;
use crate::disambiguation::{Disambiguation, Document, Scorer, Strategy, TreeEnsemble};
use crate::error::Result;
use crate::models::{AncestorIndex, CandidateMap, LocationAnnotation, Span};
use crate::normalize::Normalizer;
use crate::source::{lookup_candidates, resolve_ancestors, LocationSource};

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// One input document: text plus the spans found by an upstream tagger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

/// Candidates and hierarchy fetched for one document.
struct Prepared {
    spans: Vec<Span>,
    candidates: CandidateMap,
    ancestors: AncestorIndex,
}

pub struct LocationExtractor<S> {
    source: S,
    strategy: Strategy,
    normalizer: Normalizer,
    tagger: Option<CoordinateTagger>,
    timeout: Duration,
}

impl<S: LocationSource> LocationExtractor<S> {
    pub fn new(source: S, strategy: Strategy) -> Self {
        Self {
            source,
            strategy,
            normalizer: Normalizer::default(),
            tagger: Some(CoordinateTagger::new()),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Build from an engine config, loading the optional models and
    /// abbreviation tables it names.
    pub fn from_config(source: S, config: &EngineConfig) -> Result<Self> {
        let scorer: Option<Arc<dyn Scorer>> = match &config.engine.scorer_model {
            Some(path) => Some(Arc::new(TreeEnsemble::load(path)?)),
            None => None,
        };
        let context = match &config.engine.context_model {
            Some(path) => Some(Arc::new(ContextModel::load_tsv(path)?)),
            None => None,
        };
        let mut normalizer = Normalizer::default();
        if let Some(dir) = &config.engine.abbreviations_dir {
            normalizer.load_from_dir(dir)?;
        }

        let strategy = Strategy::from_config(config.engine.strategy, config.thresholds.clone(), scorer, context)?;
        info!("Using {} disambiguation", strategy.kind());
        Ok(Self::new(source, strategy)
            .with_normalizer(normalizer)
            .with_timeout(config.lookup_timeout()))
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable the coordinate-literal tagger (on by default).
    pub fn with_coordinate_tagging(mut self, enabled: bool) -> Self {
        self.tagger = enabled.then(CoordinateTagger::new);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Located, non-overlapping annotations for one document, ordered by
    /// position. Malformed spans are skipped; lookup failures only reduce
    /// what can be resolved.
    pub async fn extract(&self, text: &str, spans: &[Span]) -> Vec<LocationAnnotation> {
        let prepared = self.prepare(text, spans).await;
        self.finish(text, &prepared)
    }

    /// Extract from many independent documents. Lookups run one document at
    /// a time; disambiguation runs in parallel.
    pub async fn extract_batch(&self, documents: &[InputDocument]) -> Vec<Vec<LocationAnnotation>> {
        let mut prepared = Vec::with_capacity(documents.len());
        for document in documents {
            prepared.push(self.prepare(&document.text, &document.spans).await);
        }
        documents
            .par_iter()
            .zip(prepared.par_iter())
            .map(|(document, prepared)| self.finish(&document.text, prepared))
            .collect()
    }

    async fn prepare(&self, text: &str, spans: &[Span]) -> Prepared {
        let spans: Vec<Span> = spans
            .iter()
            .filter(|span| match span.validate(text) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Skipping span '{}': {}", span.value, e);
                    false
                }
            })
            .cloned()
            .collect();

        let names: Vec<String> = spans.iter().map(|s| self.normalizer.normalize(&s.value)).collect();
        let candidates = lookup_candidates(&self.source, &names, self.timeout).await;
        let ancestors = if self.strategy.kind() == StrategyKind::Hierarchy {
            resolve_ancestors(&self.source, &candidates, self.timeout).await
        } else {
            AncestorIndex::new()
        };
        debug!(
            "{} spans, {} names with candidates, {} ancestors",
            spans.len(),
            candidates.len(),
            ancestors.len()
        );

        Prepared {
            spans,
            candidates,
            ancestors,
        }
    }

    fn finish(&self, text: &str, prepared: &Prepared) -> Vec<LocationAnnotation> {
        let document = Document::new(
            text,
            &prepared.spans,
            &prepared.candidates,
            &prepared.ancestors,
            &self.normalizer,
        );
        let disambiguated = self.strategy.disambiguate(&document);
        let structured = match &self.tagger {
            Some(tagger) => tagger.tag(text),
            None => Vec::new(),
        };
        assemble(disambiguated, structured)
    }
}
