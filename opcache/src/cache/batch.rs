//! Multi-key lookup protocol.
//!
//! A batch lookup classifies every key once, serves fresh and stale entries
//! from the store, then calls the batch operation at most twice: once,
//! awaited, for the keys with no usable entry, and once in the background
//! for the stale keys this call managed to claim.

use std::future::Future;
use std::sync::Arc;

use opcache_core::{BatchError, CacheKey, OpCacheResult};
use tokio::time::Instant;

use super::entry::{CacheEntry, EntryState};
use super::op_cache::OpCache;
use super::stats::CacheStats;

impl<T, E> OpCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Get the results of an operation for many keys at once.
    ///
    /// `batch_op` receives positions into `keys` and must return one outcome
    /// per position, in the same order. Callers map positions back to their
    /// own arguments with [`select_by_indices`](opcache_core::select_by_indices).
    ///
    /// The returned vector has one outcome per key, in key order. The only
    /// error is [`BatchError::LengthMismatch`], returned when the synchronous
    /// call of `batch_op` breaks the one-outcome-per-position contract.
    pub async fn multi_get<K, F, Fut>(
        &self,
        keys: &[K],
        batch_op: F,
    ) -> OpCacheResult<Vec<Result<T, E>>>
    where
        K: AsRef<str>,
        F: Fn(Vec<usize>) -> Fut + Send + 'static,
        Fut: Future<Output = Vec<Result<T, E>>> + Send + 'static,
    {
        let now = Instant::now();
        let normalized: Vec<CacheKey> = keys
            .iter()
            .map(|k| CacheKey::normalize(k.as_ref()))
            .collect();

        let mut slots: Vec<Option<Result<T, E>>> = Vec::with_capacity(keys.len());
        let mut missing: Vec<usize> = Vec::new();
        let mut stale: Vec<(usize, Arc<CacheEntry<T, E>>)> = Vec::new();

        for (pos, key) in normalized.iter().enumerate() {
            let cached = self.store().get(key);
            match (EntryState::of(cached.as_deref(), now), cached) {
                (EntryState::Fresh, Some(entry)) => {
                    slots.push(Some(entry.outcome().clone()));
                }
                (EntryState::Grace, Some(entry)) => {
                    slots.push(Some(entry.outcome().clone()));
                    stale.push((pos, entry));
                }
                _ => {
                    slots.push(None);
                    missing.push(pos);
                }
            }
        }

        let stats = self.counters();
        CacheStats::add(&stats.hits, keys.len() - missing.len() - stale.len());
        CacheStats::add(&stats.stale_hits, stale.len());
        CacheStats::add(&stats.misses, missing.len());
        tracing::trace!(
            keys = keys.len(),
            missing = missing.len(),
            stale = stale.len(),
            "Classified batch lookup"
        );

        if !missing.is_empty() {
            tracing::debug!(count = missing.len(), "Executing batch operation for missing keys");
            let outcomes = batch_op(missing.clone()).await;
            if outcomes.len() != missing.len() {
                return Err(BatchError::LengthMismatch {
                    expected: missing.len(),
                    got: outcomes.len(),
                }
                .into());
            }
            for (pos, outcome) in missing.into_iter().zip(outcomes) {
                self.store_outcome(normalized[pos].clone(), &outcome);
                slots[pos] = Some(outcome);
            }
        }

        let mut claimed: Vec<usize> = Vec::new();
        for (pos, entry) in &stale {
            if entry.try_claim_refresh() {
                claimed.push(*pos);
            }
        }

        if !claimed.is_empty() {
            CacheStats::add(&stats.refreshes, claimed.len());
            tracing::debug!(count = claimed.len(), "Refreshing stale keys in background");
            let claimed_keys: Vec<CacheKey> =
                claimed.iter().map(|&pos| normalized[pos].clone()).collect();
            let cache = self.clone();
            tokio::spawn(async move {
                let outcomes = batch_op(claimed).await;
                if outcomes.len() != claimed_keys.len() {
                    tracing::warn!(
                        expected = claimed_keys.len(),
                        got = outcomes.len(),
                        "Background batch operation returned wrong number of results, discarding"
                    );
                    return;
                }
                for (key, outcome) in claimed_keys.into_iter().zip(outcomes) {
                    cache.store_outcome(key, &outcome);
                }
            });
        }

        // Every slot is filled at this point
        let results: Vec<Result<T, E>> = slots.into_iter().flatten().collect();
        debug_assert_eq!(results.len(), keys.len());
        Ok(results)
    }
}
