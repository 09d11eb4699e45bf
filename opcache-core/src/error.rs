//! Error types for opcache operations
//!
//! The cache never wraps or rewrites errors produced by cached operations;
//! those are replayed to callers as-is. The types here cover the cache's own
//! failure modes: bad configuration and batch contract violations.

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Batch operation contract violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("Batch operation returned {got} results for {expected} positions")]
    LengthMismatch { expected: usize, got: usize },
}

/// Master error type for opcache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpCacheError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),
}

/// Result type alias for opcache operations.
pub type OpCacheResult<T> = Result<T, OpCacheError>;
