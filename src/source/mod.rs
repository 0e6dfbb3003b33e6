//! Gazetteer access.
//!
//! A [`LocationSource`] answers name and id queries. The pipeline talks to it
//! through [`lookup_candidates`] and [`resolve_ancestors`], which issue one
//! batched, time-bounded call per document and degrade to empty results
//! instead of failing.

pub mod caching;
pub mod http;
pub mod memory;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{AncestorIndex, CandidateMap, Location, LocationId};

pub use caching::{CacheMetrics, CacheStats, CachingLocationSource};
pub use http::HttpLocationSource;
pub use memory::InMemoryLocationSource;

/// Read-only gazetteer contract.
///
/// Implementations must be idempotent and free of side effects observable by
/// callers. Unknown names map to no entry (or an empty list), never an error.
pub trait LocationSource: Send + Sync {
    /// Candidates for every name, keyed by the name as given.
    fn retrieve_locations(
        &self,
        names: &[String],
    ) -> impl Future<Output = Result<HashMap<String, Vec<Location>>>> + Send;

    /// Locations for the given ids; unknown ids are skipped.
    fn retrieve_by_ids(
        &self,
        ids: &[LocationId],
    ) -> impl Future<Output = Result<Vec<Location>>> + Send;

    /// Candidates for a single name.
    fn retrieve_location(&self, name: &str) -> impl Future<Output = Result<Vec<Location>>> + Send {
        let names = vec![name.to_string()];
        async move {
            let mut found = self.retrieve_locations(&names).await?;
            Ok(found.remove(&names[0]).unwrap_or_default())
        }
    }

    /// Ancestors of `location`, nearest first.
    fn hierarchy(&self, location: &Location) -> impl Future<Output = Result<Vec<Location>>> + Send {
        let ids = location.ancestor_ids().to_vec();
        async move {
            let mut by_id: HashMap<LocationId, Location> = self
                .retrieve_by_ids(&ids)
                .await?
                .into_iter()
                .map(|l| (l.id(), l))
                .collect();
            Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
        }
    }
}

/// Batched candidate lookup for one document.
///
/// Duplicate names are queried once. On error or timeout every name is
/// treated as having no candidates.
pub async fn lookup_candidates<S: LocationSource>(
    source: &S,
    names: &[String],
    timeout: Duration,
) -> CandidateMap {
    let unique: Vec<String> = names
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if unique.is_empty() {
        return CandidateMap::new();
    }

    let found = match bounded(timeout, source.retrieve_locations(&unique)).await {
        Ok(found) => found,
        Err(e) => {
            warn!("Candidate lookup for {} names failed: {}", unique.len(), e);
            return CandidateMap::new();
        }
    };

    let mut candidates = CandidateMap::new();
    for name in &unique {
        if let Some(locations) = found.get(name) {
            debug!("'{}' has {} candidates", name, locations.len());
            candidates.insert(name, locations.iter().cloned());
        }
    }
    candidates.prefer_located();
    candidates
}

/// Resolve every ancestor id referenced by the candidates in one batch.
///
/// On error or timeout the index is empty; strategies then work without
/// hierarchy information.
pub async fn resolve_ancestors<S: LocationSource>(
    source: &S,
    candidates: &CandidateMap,
    timeout: Duration,
) -> AncestorIndex {
    let ids: Vec<LocationId> = candidates
        .all_locations()
        .iter()
        .flat_map(|l| l.ancestor_ids().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if ids.is_empty() {
        return AncestorIndex::new();
    }

    match bounded(timeout, source.retrieve_by_ids(&ids)).await {
        Ok(ancestors) => ancestors.into_iter().collect(),
        Err(e) => {
            warn!("Ancestor lookup for {} ids failed: {}", ids.len(), e);
            AncestorIndex::new()
        }
    }
}

async fn bounded<T>(timeout: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::LookupTimeout(timeout)),
    }
}
