//! opcache Core - Shared Types
//!
//! Configuration, error types and key normalization for the operation cache.
//! This crate contains no concurrency and no cache state; the engine lives
//! in the `opcache` crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod key;
pub mod slices;

pub use config::{ErrorExpiration, ErrorExpirationPolicy, EvictorConfig, OpCacheConfig};
pub use error::{BatchError, ConfigError, OpCacheError, OpCacheResult};
pub use key::{CacheKey, KeyDigest, KEY_HASH_THRESHOLD};
pub use slices::select_by_indices;
