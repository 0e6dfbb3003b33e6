//! Caching decorator for slow gazetteers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::LocationSource;
use crate::error::Result;
use crate::models::{Location, LocationId};

/// Hit/miss counters owned by one cache instance.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of requests served from the cache; 0 before the first request.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl CacheMetrics {
    fn record(&self, hits: u64, misses: u64) {
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(misses, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Wraps a [`LocationSource`] and memoizes name and id lookups.
///
/// Names with no candidates are cached as well. Only the names and ids missing
/// from the cache are forwarded, in one batch per call.
pub struct CachingLocationSource<S> {
    inner: S,
    names: Mutex<HashMap<String, Vec<Location>>>,
    ids: Mutex<HashMap<LocationId, Location>>,
    metrics: CacheMetrics,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicked writer leaves a consistent map behind, so poisoning is ignored
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<S: LocationSource> CachingLocationSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            names: Mutex::new(HashMap::new()),
            ids: Mutex::new(HashMap::new()),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn clear(&self) {
        lock(&self.names).clear();
        lock(&self.ids).clear();
    }
}

impl<S: LocationSource> LocationSource for CachingLocationSource<S> {
    async fn retrieve_locations(&self, names: &[String]) -> Result<HashMap<String, Vec<Location>>> {
        let mut result = HashMap::new();
        let mut missing = Vec::new();
        {
            let cache = lock(&self.names);
            for name in names {
                match cache.get(name) {
                    Some(found) => {
                        result.insert(name.clone(), found.clone());
                    }
                    None if !missing.contains(name) => missing.push(name.clone()),
                    None => {}
                }
            }
        }
        self.metrics.record(result.len() as u64, missing.len() as u64);

        if !missing.is_empty() {
            debug!("Cache miss for {} of {} names", missing.len(), names.len());
            let mut fetched = self.inner.retrieve_locations(&missing).await?;
            let mut cache = lock(&self.names);
            for name in missing {
                let found = fetched.remove(&name).unwrap_or_default();
                cache.insert(name.clone(), found.clone());
                result.insert(name, found);
            }
        }

        result.retain(|_, found| !found.is_empty());
        Ok(result)
    }

    async fn retrieve_by_ids(&self, ids: &[LocationId]) -> Result<Vec<Location>> {
        let mut missing = Vec::new();
        {
            let cache = lock(&self.ids);
            for id in ids {
                if !cache.contains_key(id) && !missing.contains(id) {
                    missing.push(*id);
                }
            }
        }
        self.metrics
            .record((ids.len() - missing.len()) as u64, missing.len() as u64);

        if !missing.is_empty() {
            let fetched = self.inner.retrieve_by_ids(&missing).await?;
            let mut cache = lock(&self.ids);
            for location in fetched {
                cache.insert(location.id(), location);
            }
        }

        let cache = lock(&self.ids);
        Ok(ids.iter().filter_map(|id| cache.get(id)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationType;
    use crate::source::InMemoryLocationSource;

    fn cached() -> CachingLocationSource<InMemoryLocationSource> {
        let source = InMemoryLocationSource::new(vec![
            Location::new(1, "Berlin", LocationType::City),
            Location::new(2, "Germany", LocationType::Country),
        ]);
        CachingLocationSource::new(source)
    }

    #[tokio::test]
    async fn test_hits_and_misses_are_counted() {
        let source = cached();
        let names = vec!["Berlin".to_string(), "Atlantis".to_string()];

        let first = source.retrieve_locations(&names).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(source.metrics().snapshot(), CacheStats { hits: 0, misses: 2 });

        // unknown names are cached too
        let second = source.retrieve_locations(&names).await.unwrap();
        assert_eq!(second["Berlin"][0].id(), 1);
        assert_eq!(source.metrics().snapshot(), CacheStats { hits: 2, misses: 2 });
        assert!((source.metrics().snapshot().hit_rate() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_metrics_are_per_instance() {
        let a = cached();
        let b = cached();
        a.retrieve_locations(&["Berlin".to_string()]).await.unwrap();
        assert_eq!(a.metrics().snapshot().misses, 1);
        assert_eq!(b.metrics().snapshot(), CacheStats::default());
        assert_eq!(b.metrics().snapshot().hit_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_ids_cached_in_request_order() {
        let source = cached();
        let found = source.retrieve_by_ids(&[2, 1, 99]).await.unwrap();
        let ids: Vec<LocationId> = found.iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec![2, 1]);

        source.retrieve_by_ids(&[1]).await.unwrap();
        let stats = source.metrics().snapshot();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 3);

        source.clear();
        source.metrics().reset();
        source.retrieve_by_ids(&[1]).await.unwrap();
        assert_eq!(source.metrics().snapshot(), CacheStats { hits: 0, misses: 1 });
    }
}
