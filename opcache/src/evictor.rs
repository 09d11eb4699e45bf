//! Evictor Background Task
//!
//! Lookups already treat entries past their grace window as absent; the
//! evictor only reclaims their memory. One task can sweep any number of
//! caches, whatever their value and error types, through the [`Evict`]
//! trait.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use opcache::{run_evictor, Evict, EvictorConfig, OpCache, OpCacheConfig};
//! use tokio::sync::watch;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let points: OpCache<u32, String> = OpCache::new(OpCacheConfig::new(Duration::from_secs(30)));
//!     let users: OpCache<String, ()> = OpCache::new(OpCacheConfig::new(Duration::from_secs(60)));
//!
//!     let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let caches: Vec<Arc<dyn Evict>> = vec![Arc::new(points.clone()), Arc::new(users.clone())];
//!     let handle = tokio::spawn(run_evictor(EvictorConfig::default(), caches, shutdown_rx));
//!
//!     // On shutdown
//!     let _ = shutdown_tx.send(true);
//!     let metrics = handle.await.expect("evictor task panicked");
//!     assert_eq!(metrics.snapshot().entries_evicted, 0);
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use opcache_core::EvictorConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::cache::OpCache;

/// Shortest period the evictor ticks at; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Anything that can drop its expired entries.
pub trait Evict: Send + Sync {
    /// Sweep once, returning the number of removed entries.
    fn evict(&self) -> usize;
}

impl<T, E> Evict for OpCache<T, E>
where
    T: Send + Sync,
    E: Send + Sync,
{
    fn evict(&self) -> usize {
        OpCache::evict(self)
    }
}

impl<C: Evict + ?Sized> Evict for Arc<C> {
    fn evict(&self) -> usize {
        (**self).evict()
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Metrics for evictor activity.
#[derive(Debug, Default)]
pub struct EvictorMetrics {
    /// Total sweep cycles completed
    pub sweep_cycles: AtomicU64,

    /// Total entries removed across all caches
    pub entries_evicted: AtomicU64,
}

impl EvictorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> EvictorSnapshot {
        EvictorSnapshot {
            sweep_cycles: self.sweep_cycles.load(Ordering::Relaxed),
            entries_evicted: self.entries_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of evictor metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictorSnapshot {
    pub sweep_cycles: u64,
    pub entries_evicted: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that periodically sweeps the given caches.
///
/// The first sweep happens one period after start. The task returns when
/// `true` is sent on the shutdown channel or the sender is dropped; it never
/// fails.
pub async fn run_evictor(
    config: EvictorConfig,
    caches: Vec<Arc<dyn Evict>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<EvictorMetrics> {
    let metrics = Arc::new(EvictorMetrics::new());

    let period = config.period.max(MIN_PERIOD);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        period_ms = period.as_millis() as u64,
        caches = caches.len(),
        "Evictor task started"
    );

    if !*shutdown_rx.borrow() {
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    sweep(&caches, &metrics);
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweep_cycles = snapshot.sweep_cycles,
        entries_evicted = snapshot.entries_evicted,
        "Evictor task shutting down"
    );

    metrics
}

/// Perform one sweep over every cache.
fn sweep(caches: &[Arc<dyn Evict>], metrics: &EvictorMetrics) {
    metrics.sweep_cycles.fetch_add(1, Ordering::Relaxed);

    let removed: usize = caches.iter().map(|cache| cache.evict()).sum();
    if removed > 0 {
        metrics
            .entries_evicted
            .fetch_add(removed as u64, Ordering::Relaxed);
        tracing::debug!(removed, "Evictor sweep completed");
    } else {
        tracing::trace!("Evictor sweep completed with nothing to remove");
    }
}
