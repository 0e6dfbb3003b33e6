//! Final merge of disambiguated and structured annotations.

use tracing::debug;

use crate::models::LocationAnnotation;

/// Collects annotations from several producers and resolves overlaps.
///
/// When two annotations overlap the longer one is kept; on equal length the
/// one registered first wins. The result is ordered by start offset.
#[derive(Debug, Default)]
pub struct Assembler {
    registered: Vec<LocationAnnotation>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<I>(&mut self, annotations: I) -> &mut Self
    where
        I: IntoIterator<Item = LocationAnnotation>,
    {
        self.registered.extend(annotations);
        self
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    pub fn finish(self) -> Vec<LocationAnnotation> {
        let total = self.registered.len();
        let mut order: Vec<usize> = (0..total).collect();
        // stable: equal lengths stay in registration order
        order.sort_by_key(|&i| std::cmp::Reverse(self.registered[i].span.len()));

        let mut keep = vec![false; total];
        let mut accepted: Vec<usize> = Vec::new();
        for i in order {
            let span = &self.registered[i].span;
            if accepted.iter().any(|&j| self.registered[j].span.overlaps(span)) {
                debug!("Removing nested annotation '{}' at {}", span.value, span.start);
                continue;
            }
            accepted.push(i);
            keep[i] = true;
        }

        let mut result: Vec<LocationAnnotation> = self
            .registered
            .into_iter()
            .zip(keep)
            .filter_map(|(annotation, kept)| kept.then_some(annotation))
            .collect();
        result.sort_by_key(|a| (a.start(), a.end()));
        result
    }
}

/// Merge gazetteer-based and structured annotations; gazetteer results are
/// registered first.
pub fn assemble(
    disambiguated: Vec<LocationAnnotation>,
    structured: Vec<LocationAnnotation>,
) -> Vec<LocationAnnotation> {
    let mut assembler = Assembler::new();
    assembler.register(disambiguated).register(structured);
    assembler.finish()
}
