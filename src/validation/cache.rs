//! Bounded memo of validity verdicts.
//!
//! Eviction is least-recently-used: a lookup hit refreshes the entry, and
//! inserting into a full cache drops the entry that was used longest ago.
//! Entries are keyed by `(scope, trimmed input)` where the scope is the
//! field key, so verdicts of different checks never mix.
//!
//! The cache has its own lock, independent of the store's. A poisoned lock
//! is recovered rather than reported: entries are derived data and losing
//! them only costs recomputation.

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    scope: String,
    input: String,
}

impl CacheKey {
    fn new(scope: &str, input: &str) -> Self {
        Self {
            scope: scope.to_string(),
            input: input.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct ValidationCache {
    entries: Mutex<LruCache<CacheKey, bool>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ValidationCache {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<CacheKey, bool>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached verdict for `input`, or runs `check` on the
    /// trimmed input and remembers the result.
    ///
    /// `check` runs without the cache lock held.
    pub fn validate<F>(&self, scope: &str, input: &str, check: F) -> bool
    where
        F: FnOnce(&str) -> bool,
    {
        let key = CacheKey::new(scope, input);
        if let Some(verdict) = self.entries().get(&key).copied() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return verdict;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let verdict = check(key.input.as_str());
        self.entries().put(key, verdict);
        verdict
    }

    /// Looks up a verdict without refreshing its recency.
    pub fn peek(&self, scope: &str, input: &str) -> Option<bool> {
        self.entries().peek(&CacheKey::new(scope, input)).copied()
    }

    /// Forgets one verdict, e.g. after the caller changed that file.
    pub fn invalidate(&self, scope: &str, input: &str) -> bool {
        self.entries().pop(&CacheKey::new(scope, input)).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries().cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries();
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
