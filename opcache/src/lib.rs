//! opcache - Operation Result Cache
//!
//! Caches the results of arbitrary idempotent operations under a string key.
//! Results are fresh for a configured expiration; after that, an optional
//! grace period serves the stale result while a single background task
//! refreshes it. A periodic evictor removes entries that are past grace.
//!
//! # Example
//!
//! ```rust
//! use opcache::{OpCache, OpCacheConfig};
//! use std::time::Duration;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! async fn fetch_point(x: i32, y: i32) -> Result<Point, String> {
//!     Ok(Point { x, y })
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), String> {
//!     let points: OpCache<Point, String> = OpCache::new(
//!         OpCacheConfig::new(Duration::from_secs(30))
//!             .with_grace_expiration(Duration::from_secs(10)),
//!     );
//!
//!     let (x, y) = (1, 2);
//!     let point = points
//!         .get(&format!("{x} {y}"), move || fetch_point(x, y))
//!         .await?;
//!     assert_eq!(point, Point { x: 1, y: 2 });
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod evictor;

pub use cache::{CacheEntry, CacheStats, CacheStatsSnapshot, CacheStore, EntryState, OpCache};
pub use evictor::{run_evictor, Evict, EvictorMetrics, EvictorSnapshot};

// Re-export core types so callers need a single dependency
pub use opcache_core::{
    select_by_indices, BatchError, CacheKey, ConfigError, ErrorExpiration, ErrorExpirationPolicy,
    EvictorConfig, OpCacheConfig, OpCacheError, OpCacheResult,
};
