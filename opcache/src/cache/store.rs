//! Keyed entry store.
//!
//! One `RwLock` guards the shape of the map. It is held only for a lookup or
//! a pointer swap, never while an operation runs, and is independent of the
//! per-entry refresh flag.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use opcache_core::CacheKey;
use tokio::time::Instant;

use super::entry::CacheEntry;

/// Mapping from normalized key to the current entry.
#[derive(Debug)]
pub struct CacheStore<T, E> {
    entries: RwLock<HashMap<CacheKey, Arc<CacheEntry<T, E>>>>,
}

impl<T, E> Default for CacheStore<T, E> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T, E> CacheStore<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry for `key`, whatever its validity.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry<T, E>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Make `entry` the current entry for `key`, replacing any previous one.
    pub fn insert(&self, key: CacheKey, entry: CacheEntry<T, E>) -> Arc<CacheEntry<T, E>> {
        let entry = Arc::new(entry);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&entry));
        entry
    }

    /// Remove every entry whose grace window has lapsed at `now`.
    ///
    /// Returns the number of removed entries.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_grace_valid_at(now));
        before - entries.len()
    }

    /// Number of stored entries, including lapsed ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
