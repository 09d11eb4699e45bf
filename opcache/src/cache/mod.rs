//! Cache engine: entries, the keyed store, and the lookup protocols.
//!
//! # Validity windows
//!
//! Every entry carries two deadlines. Before `expires_at` it is fresh and
//! returned as-is. Between `expires_at` and `grace_expires_at` it is stale
//! but still returned, and the first caller to see it stale launches a
//! background refresh. After `grace_expires_at` it is treated as absent and
//! the caller recomputes synchronously.
//!
//! # Replacement
//!
//! Entries are never mutated. A refresh builds a new entry and swaps the
//! `Arc` in the store, so readers holding the old entry keep a consistent
//! snapshot.

pub mod batch;
pub mod entry;
pub mod op_cache;
pub mod stats;
pub mod store;

pub use entry::{CacheEntry, EntryState};
pub use op_cache::OpCache;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use store::CacheStore;
