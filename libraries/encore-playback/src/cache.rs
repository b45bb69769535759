//! Search-result cache with LRU eviction and TTL expiry

use encore_core::SearchResult;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CachedSearch {
    result: SearchResult,
    inserted_at: Instant,
}

/// Caches search results per normalized query string
///
/// An identical query within the TTL window is served from the cache
/// without invoking any provider; stale entries are evicted on read.
pub struct SearchCache {
    entries: Mutex<LruCache<String, CachedSearch>>,
    ttl: Duration,
}

impl SearchCache {
    /// Create a cache holding up to `capacity` entries, each valid for `ttl`
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fetch a cached result if present and still fresh
    pub fn get(&self, query: &str) -> Option<SearchResult> {
        let key = Self::normalize(query);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get(&key) {
            Some(cached) if cached.inserted_at.elapsed() < self.ttl => {
                Some(cached.result.clone())
            }
            Some(_) => {
                entries.pop(&key);
                None
            }
            None => None,
        }
    }

    /// Store a search result for `query`
    pub fn insert(&self, query: &str, result: SearchResult) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.put(
            Self::normalize(query),
            CachedSearch {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop all cached entries
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn normalize(query: &str) -> String {
        query.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::Track;

    fn result_for(title: &str) -> SearchResult {
        SearchResult::single(Track::new(title, "https://example.com/a", "test"))
    }

    #[test]
    fn hit_within_ttl() {
        let cache = SearchCache::new(10, Duration::from_secs(60));
        cache.insert("Never Gonna", result_for("Never Gonna Give You Up"));

        let hit = cache.get("never gonna").unwrap();
        assert_eq!(hit.first().unwrap().title, "Never Gonna Give You Up");
    }

    #[test]
    fn miss_after_ttl() {
        let cache = SearchCache::new(10, Duration::from_millis(0));
        cache.insert("q", result_for("Song"));

        // TTL of zero: immediately stale
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let cache = SearchCache::new(2, Duration::from_secs(60));
        cache.insert("a", result_for("A"));
        cache.insert("b", result_for("B"));
        cache.insert("c", result_for("C"));

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn clear_empties_cache() {
        let cache = SearchCache::new(10, Duration::from_secs(60));
        cache.insert("a", result_for("A"));
        cache.clear();
        assert!(cache.get("a").is_none());
    }
}
