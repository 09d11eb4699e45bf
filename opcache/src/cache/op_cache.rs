//! Single-key lookup protocol.

use std::future::Future;
use std::sync::Arc;

use opcache_core::{CacheKey, ErrorExpiration, OpCacheConfig};
use tokio::time::Instant;

use super::entry::{CacheEntry, EntryState};
use super::stats::{CacheStats, CacheStatsSnapshot};
use super::store::CacheStore;

/// Result cache for operations producing `Result<T, E>`.
///
/// Cloning is cheap and clones share the same entries. Operations with
/// several results should return them as a tuple or struct.
///
/// # Lookup outcomes
///
/// - Fresh entry: returned without running the operation.
/// - Entry in its grace window: returned immediately; the first caller to
///   see it stale spawns the operation in the background to replace it.
/// - No usable entry: the operation runs in the caller's task, its outcome
///   is stored and returned.
///
/// Background refreshes have no timeout. An operation that never finishes
/// keeps its entry's refresh claim, so that entry is served stale until its
/// grace window ends and is then recomputed synchronously.
pub struct OpCache<T, E> {
    inner: Arc<Inner<T, E>>,
}

struct Inner<T, E> {
    config: OpCacheConfig<E>,
    store: CacheStore<T, E>,
    stats: CacheStats,
}

impl<T, E> OpCache<T, E> {
    /// Create a new, empty cache.
    pub fn new(config: OpCacheConfig<E>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store: CacheStore::new(),
                stats: CacheStats::new(),
            }),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &OpCacheConfig<E> {
        &self.inner.config
    }

    pub(crate) fn store(&self) -> &CacheStore<T, E> {
        &self.inner.store
    }

    pub(crate) fn counters(&self) -> &CacheStats {
        &self.inner.stats
    }

    /// Get current snapshot of the usage counters.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Number of stored entries, including lapsed ones not yet evicted.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Remove entries that are past their grace window.
    ///
    /// Returns the number of removed entries. Lookups already ignore such
    /// entries; sweeping only releases their memory.
    pub fn evict(&self) -> usize {
        let removed = self.inner.store.sweep_at(Instant::now());
        if removed > 0 {
            CacheStats::add(&self.inner.stats.evicted, removed);
            tracing::debug!(removed, remaining = self.len(), "Evicted expired cache entries");
        }
        removed
    }
}

impl<T, E> OpCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Get the result of an operation, running `op` only when needed.
    ///
    /// `key` must identify the operation and all of its arguments.
    pub async fn get<F, Fut>(&self, key: &str, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let key = CacheKey::normalize(key);
        let now = Instant::now();

        let cached = self.inner.store.get(&key);
        let entry = match (EntryState::of(cached.as_deref(), now), cached) {
            (EntryState::Fresh, Some(entry)) => {
                CacheStats::add(&self.inner.stats.hits, 1);
                tracing::trace!(key = %key, "Cache hit");
                return entry.outcome().clone();
            }
            (EntryState::Grace, Some(entry)) => entry,
            _ => {
                CacheStats::add(&self.inner.stats.misses, 1);
                tracing::debug!(key = %key, "Cache miss, executing operation");
                let outcome = op().await;
                self.store_outcome(key, &outcome);
                return outcome;
            }
        };

        CacheStats::add(&self.inner.stats.stale_hits, 1);
        let stale = entry.outcome().clone();

        if entry.try_claim_refresh() {
            CacheStats::add(&self.inner.stats.refreshes, 1);
            tracing::debug!(key = %key, "Serving stale result, refreshing in background");
            let cache = self.clone();
            tokio::spawn(async move {
                let outcome = op().await;
                cache.store_outcome(key, &outcome);
            });
        } else {
            tracing::trace!(key = %key, "Serving stale result, refresh already in flight");
        }

        stale
    }

    /// Store the outcome of one operation execution under `key`.
    ///
    /// Error outcomes go through the error expiration policy first, which
    /// may drop them or change their windows.
    pub(crate) fn store_outcome(&self, key: CacheKey, outcome: &Result<T, E>) {
        let config = &self.inner.config;
        let decision = match (outcome, &config.error_expiration) {
            (Err(err), Some(policy)) => policy(err),
            _ => ErrorExpiration::keep(),
        };

        if decision.discard {
            CacheStats::add(&self.inner.stats.discarded, 1);
            tracing::debug!(key = %key, "Error result discarded by policy");
            return;
        }

        let (expiration, grace_expiration) =
            decision.resolve(config.result_expiration, config.result_grace_expiration);
        self.inner.store.insert(
            key,
            CacheEntry::new(outcome.clone(), expiration, grace_expiration),
        );
    }
}

impl<T, E> Clone for OpCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> std::fmt::Debug for OpCache<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpCache")
            .field("config", &self.inner.config)
            .field("entries", &self.inner.store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
        counter: usize,
    }

    fn point_op(
        counter: &Arc<AtomicUsize>,
        x: i32,
        y: i32,
    ) -> impl FnOnce() -> std::future::Ready<Result<Point, String>> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(Point { x, y, counter: n }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiration_reruns_operation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = OpCache::new(OpCacheConfig::new(Duration::from_millis(100)));

        let p = cache.get("1 2", point_op(&counter, 1, 2)).await.unwrap();
        assert_eq!(p, Point { x: 1, y: 2, counter: 1 });

        let p = cache.get("1 2", point_op(&counter, 1, 2)).await.unwrap();
        assert_eq!(p.counter, 1);

        sleep(Duration::from_millis(110)).await;
        let p = cache.get("1 2", point_op(&counter, 1, 2)).await.unwrap();
        assert_eq!(p.counter, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tuple_results_cached_with_error() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache: OpCache<(i32, usize), String> =
            OpCache::new(OpCacheConfig::new(Duration::from_millis(100)));

        let op = |counter: Arc<AtomicUsize>| {
            move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Err::<(i32, usize), _>(format!("test_error_{n}"))
            }
        };

        assert_eq!(
            cache.get("1 2", op(Arc::clone(&counter))).await,
            Err("test_error_1".to_string())
        );
        // Errors are cached like any other result
        assert_eq!(
            cache.get("1 2", op(Arc::clone(&counter))).await,
            Err("test_error_1".to_string())
        );
        sleep(Duration::from_millis(110)).await;
        assert_eq!(
            cache.get("1 2", op(Arc::clone(&counter))).await,
            Err("test_error_2".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_serves_stale_and_refreshes_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = OpCache::new(
            OpCacheConfig::new(Duration::from_millis(100))
                .with_grace_expiration(Duration::from_millis(50)),
        );

        cache.get("k", point_op(&counter, 0, 0)).await.unwrap();
        sleep(Duration::from_millis(120)).await;

        for _ in 0..5 {
            let p = cache.get("k", point_op(&counter, 0, 0)).await.unwrap();
            assert_eq!(p.counter, 1, "stale value served during grace");
        }

        // Let the background refresh run
        tokio::task::yield_now().await;
        sleep(Duration::from_millis(1)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        let p = cache.get("k", point_op(&counter, 0, 0)).await.unwrap();
        assert_eq!(p.counter, 2);

        let stats = cache.stats();
        assert_eq!(stats.stale_hits, 5);
        assert_eq!(stats.refreshes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lapsed_grace_executes_synchronously() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = OpCache::new(
            OpCacheConfig::new(Duration::from_millis(100))
                .with_grace_expiration(Duration::from_millis(50)),
        );

        cache.get("k", point_op(&counter, 0, 0)).await.unwrap();
        sleep(Duration::from_millis(160)).await;

        let p = cache.get("k", point_op(&counter, 0, 0)).await.unwrap();
        assert_eq!(p.counter, 2);
        assert_eq!(cache.stats().stale_hits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_state_at_window_edges() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = OpCache::new(
            OpCacheConfig::new(Duration::from_millis(100))
                .with_grace_expiration(Duration::from_millis(50)),
        );

        cache.get("k", point_op(&counter, 0, 0)).await.unwrap();
        sleep(Duration::from_millis(99)).await;
        assert_eq!(cache.get("k", point_op(&counter, 0, 0)).await.unwrap().counter, 1);

        // expires_at itself is already stale
        sleep(Duration::from_millis(1)).await;
        assert_eq!(cache.get("k", point_op(&counter, 0, 0)).await.unwrap().counter, 1);

        // Refreshed entry was built at 100ms, so its grace ends at 250ms
        sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.get("k", point_op(&counter, 0, 0)).await.unwrap().counter, 3);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.stale_hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.refreshes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discarded_error_is_not_cached() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache: OpCache<u32, String> = OpCache::new(
            OpCacheConfig::new(Duration::from_secs(10))
                .with_error_expiration(|_| ErrorExpiration::discard()),
        );

        for expected in 1..=3 {
            let op_counter = Arc::clone(&counter);
            let outcome = cache
                .get("flaky", move || async move {
                    op_counter.fetch_add(1, Ordering::SeqCst);
                    Err("unavailable".to_string())
                })
                .await;
            assert_eq!(outcome, Err("unavailable".to_string()));
            assert_eq!(counter.load(Ordering::SeqCst), expected);
        }

        assert!(cache.is_empty());
        assert_eq!(cache.stats().discarded, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_only_sees_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy_calls = Arc::clone(&calls);
        let cache: OpCache<u32, String> = OpCache::new(
            OpCacheConfig::new(Duration::from_secs(10)).with_error_expiration(move |_| {
                policy_calls.fetch_add(1, Ordering::SeqCst);
                ErrorExpiration::keep()
            }),
        );

        cache.get("ok", || async { Ok(1) }).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let _ = cache.get("err", || async { Err("x".to_string()) }).await;
        let _ = cache.get("err", || async { Err("y".to_string()) }).await;
        // Called once per execution, not per cache read
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_override_shortens_error_expiration() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache: OpCache<u32, String> = OpCache::new(
            OpCacheConfig::new(Duration::from_secs(10)).with_error_expiration(|_| {
                ErrorExpiration::expire_after(Duration::from_millis(20))
            }),
        );

        let failing = |counter: Arc<AtomicUsize>| {
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>("timeout".to_string())
            }
        };

        let _ = cache.get("k", failing(Arc::clone(&counter))).await;
        let _ = cache.get("k", failing(Arc::clone(&counter))).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(25)).await;
        let _ = cache.get("k", failing(Arc::clone(&counter))).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_refresh_blocks_further_refreshes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache: OpCache<usize, String> = OpCache::new(
            OpCacheConfig::new(Duration::from_millis(100))
                .with_grace_expiration(Duration::from_millis(100)),
        );

        cache.get("k", || async { Ok(1) }).await.unwrap();
        sleep(Duration::from_millis(110)).await;

        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            let value = cache
                .get("k", move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::future::pending::<Result<usize, String>>().await
                })
                .await;
            assert_eq!(value, Ok(1));
        }

        sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().refreshes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_only_after_grace() {
        let cache: OpCache<u32, String> = OpCache::new(
            OpCacheConfig::new(Duration::from_millis(100))
                .with_grace_expiration(Duration::from_millis(50)),
        );
        cache.get("a", || async { Ok(1) }).await.unwrap();
        cache.get("b", || async { Ok(2) }).await.unwrap();

        sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.evict(), 0);
        assert_eq!(cache.len(), 2);

        sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.evict(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evicted, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_entries() {
        let cache: OpCache<u32, String> = OpCache::new(OpCacheConfig::new(Duration::from_secs(1)));
        let other = cache.clone();

        cache.get("k", || async { Ok(5) }).await.unwrap();
        assert_eq!(other.get("k", || async { Ok(6) }).await, Ok(5));
        assert_eq!(other.len(), 1);
    }
}
