//! Time-stamped cache of parsed repository indices.
//!
//! The cache only records when each list was stored. Deciding whether an
//! entry is still usable is left to the repository, which knows its TTL.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::RemotePackage;

/// Default time a cached index is served before refetching (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// A package list and the instant it was stored.
#[derive(Debug, Clone)]
pub struct CachedList {
    pub last_modified: Instant,
    pub data: Vec<RemotePackage>,
}

impl CachedList {
    fn new(data: Vec<RemotePackage>) -> Self {
        Self {
            last_modified: Instant::now(),
            data,
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.last_modified.elapsed() < ttl
    }
}

/// Package lists keyed by repository URL.
///
/// Safe to share between tasks behind an `Arc`.
#[derive(Debug, Default)]
pub struct IndexCache {
    lists: RwLock<HashMap<String, CachedList>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached list for `url`, regardless of age.
    pub fn get_cached_list(&self, url: &str) -> Option<CachedList> {
        let lists = self.lists.read().unwrap_or_else(|e| e.into_inner());
        lists.get(url).cloned()
    }

    /// Stores `data` for `url`, replacing any previous entry.
    pub fn cache_list(&self, url: &str, data: Vec<RemotePackage>) {
        debug!("Caching {} packages for {}", data.len(), url);
        let mut lists = self.lists.write().unwrap_or_else(|e| e.into_inner());
        lists.insert(url.to_string(), CachedList::new(data));
    }

    pub fn invalidate(&self, url: &str) {
        let mut lists = self.lists.write().unwrap_or_else(|e| e.into_inner());
        lists.remove(url);
    }

    pub fn clear(&self) {
        let mut lists = self.lists.write().unwrap_or_else(|e| e.into_inner());
        lists.clear();
    }

    pub fn len(&self) -> usize {
        self.lists.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packages(ids: &[&str]) -> Vec<RemotePackage> {
        ids.iter().map(|id| RemotePackage::new(*id, *id)).collect()
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = IndexCache::new();
        assert!(cache.get_cached_list("https://example.com/index.yml").is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = IndexCache::new();
        let url = "https://example.com/index.yml";

        cache.cache_list(url, packages(&["a"]));
        cache.cache_list(url, packages(&["b", "c"]));

        let cached = cache.get_cached_list(url).unwrap();
        assert_eq!(cached.data, packages(&["b", "c"]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_freshness() {
        let cache = IndexCache::new();
        cache.cache_list("u", packages(&["a"]));

        let cached = cache.get_cached_list("u").unwrap();
        assert!(cached.is_fresh(DEFAULT_CACHE_TTL));
        assert!(!cached.is_fresh(Duration::ZERO));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = IndexCache::new();
        cache.cache_list("one", packages(&["a"]));
        cache.cache_list("two", packages(&["b"]));

        cache.invalidate("one");
        assert!(cache.get_cached_list("one").is_none());
        assert!(cache.get_cached_list("two").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
