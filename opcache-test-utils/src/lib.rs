//! opcache Test Utilities
//!
//! Shared test infrastructure for the opcache workspace:
//! - Counting operations that record how often the cache ran them
//! - Proptest generators for cache keys
//! - Config fixtures for common scenarios

pub use opcache_core::{
    select_by_indices, CacheKey, ErrorExpiration, EvictorConfig, OpCacheConfig,
    KEY_HASH_THRESHOLD,
};

use std::future::{ready, Ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// MOCK OPERATIONS
// ============================================================================

/// Error returned by test operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    #[error("operation failed on call {0}")]
    Failed(usize),

    #[error("operation unavailable")]
    Unavailable,
}

/// Shared invocation counter for cached operations.
///
/// Clones share the same count, so a clone can be moved into each
/// operation closure while the test keeps one to assert on.
#[derive(Debug, Clone, Default)]
pub struct InvocationCounter(Arc<AtomicUsize>);

impl InvocationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation, returning the new count.
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Operation that succeeds with the invocation number.
    pub fn op(&self) -> impl FnOnce() -> Ready<Result<usize, TestError>> + Send + 'static {
        let counter = self.clone();
        move || ready(Ok(counter.bump()))
    }

    /// Operation that fails with the invocation number.
    pub fn failing_op(&self) -> impl FnOnce() -> Ready<Result<usize, TestError>> + Send + 'static {
        let counter = self.clone();
        move || ready(Err(TestError::Failed(counter.bump())))
    }

    /// Batch operation answering each position with `(position, invocation number)`.
    pub fn batch_op(
        &self,
    ) -> impl Fn(Vec<usize>) -> Ready<Vec<Result<(usize, usize), TestError>>> + Send + Sync + 'static
    {
        let counter = self.clone();
        move |positions| {
            ready(
                positions
                    .into_iter()
                    .map(|pos| Ok((pos, counter.bump())))
                    .collect(),
            )
        }
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache keys.

    use proptest::prelude::*;

    /// Key short enough to be stored as-is.
    pub fn arb_short_key() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[a-z0-9:_ ]{0,100}").expect("valid regex")
    }

    /// Key long enough to be replaced by its digest.
    pub fn arb_long_key() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[a-z0-9:_ ]{101,400}").expect("valid regex")
    }

    /// Key on either side of the hashing threshold.
    pub fn arb_key() -> impl Strategy<Value = String> {
        prop_oneof![arb_short_key(), arb_long_key()]
    }

    /// Batch of keys, duplicates allowed.
    pub fn arb_key_batch(max_len: usize) -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec(arb_key(), 0..=max_len)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Config fixtures used across cache tests.

    use super::*;
    use std::time::Duration;

    /// 100ms expiration, no grace period.
    pub fn ttl_config<E>() -> OpCacheConfig<E> {
        OpCacheConfig::new(Duration::from_millis(100))
    }

    /// 100ms expiration plus 50ms grace.
    pub fn grace_config<E>() -> OpCacheConfig<E> {
        ttl_config().with_grace_expiration(Duration::from_millis(50))
    }

    /// Grace config that never caches errors.
    pub fn discarding_config<E>() -> OpCacheConfig<E> {
        grace_config().with_error_expiration(|_| ErrorExpiration::discard())
    }
}
