//! Cache usage counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one cache, updated lock-free.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered by a fresh entry
    pub hits: AtomicU64,

    /// Lookups answered by a stale entry inside its grace window
    pub stale_hits: AtomicU64,

    /// Lookups that executed the operation synchronously
    pub misses: AtomicU64,

    /// Keys handed to a background refresh
    pub refreshes: AtomicU64,

    /// Error outcomes dropped by the error expiration policy
    pub discarded: AtomicU64,

    /// Entries removed by eviction sweeps
    pub evicted: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cache counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub refreshes: u64,
    pub discarded: u64,
    pub evicted: u64,
}

impl CacheStatsSnapshot {
    /// Fraction of lookups served from the cache, stale ones included (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}
