//! LRU cache of compiled wildcard patterns
//!
//! Statement patterns are few and reused on every request, so compiling each
//! glob once keeps matching to a single regex scan.

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Cache key for a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    pattern: String,
    ignore_case: bool,
}

/// Thread-safe LRU cache of compiled patterns
pub struct PatternCache {
    cache: Mutex<LruCache<CacheKey, Arc<Regex>>>,
}

impl PatternCache {
    /// Create a new pattern cache with given capacity (at least one entry)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PatternCache {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get a cached compiled pattern
    pub fn get(&self, pattern: &str, ignore_case: bool) -> Option<Arc<Regex>> {
        let key = CacheKey {
            pattern: pattern.to_string(),
            ignore_case,
        };
        self.cache.lock().get(&key).cloned()
    }

    /// Put a compiled pattern in the cache
    pub fn put(&self, pattern: &str, ignore_case: bool, regex: Arc<Regex>) {
        let key = CacheKey {
            pattern: pattern.to_string(),
            ignore_case,
        };
        self.cache.lock().put(key, regex);
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl std::fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternCache")
            .field("len", &self.len())
            .finish()
    }
}
