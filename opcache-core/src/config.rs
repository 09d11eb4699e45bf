//! Configuration types

use crate::constants::{
    DEFAULT_EVICTOR_PERIOD_MS, DEFAULT_RESULT_EXPIRATION_MS, DEFAULT_RESULT_GRACE_EXPIRATION_MS,
    ENV_EVICTOR_PERIOD_MS, ENV_RESULT_EXPIRATION_SUFFIX, ENV_RESULT_GRACE_EXPIRATION_SUFFIX,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Decision returned by an error expiration policy for one failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorExpiration {
    /// Do not cache this error at all.
    pub discard: bool,
    /// Overrides [`OpCacheConfig::result_expiration`] for this entry.
    pub expiration: Option<Duration>,
    /// Overrides [`OpCacheConfig::result_grace_expiration`] for this entry.
    pub grace_expiration: Option<Duration>,
}

impl ErrorExpiration {
    /// Cache the error with the configured default durations.
    pub fn keep() -> Self {
        Self::default()
    }

    /// Do not cache the error.
    pub fn discard() -> Self {
        Self {
            discard: true,
            ..Self::default()
        }
    }

    /// Cache the error with a custom expiration.
    pub fn expire_after(expiration: Duration) -> Self {
        Self {
            expiration: Some(expiration),
            ..Self::default()
        }
    }

    /// Set a custom grace expiration.
    pub fn with_grace_expiration(mut self, grace_expiration: Duration) -> Self {
        self.grace_expiration = Some(grace_expiration);
        self
    }

    /// Resolve the effective (expiration, grace) pair against the defaults.
    pub fn resolve(&self, expiration: Duration, grace_expiration: Duration) -> (Duration, Duration) {
        (
            self.expiration.unwrap_or(expiration),
            self.grace_expiration.unwrap_or(grace_expiration),
        )
    }
}

/// Policy invoked once per execution that produced an error.
pub type ErrorExpirationPolicy<E> = Arc<dyn Fn(&E) -> ErrorExpiration + Send + Sync>;

/// Configuration for an operation cache.
///
/// `E` is the error type of the cached operations; it only matters for the
/// optional error expiration policy.
pub struct OpCacheConfig<E> {
    /// Operation results are valid for this long after creation.
    pub result_expiration: Duration,

    /// Expired results are still served for this long after expiration while
    /// a background refresh runs. Zero disables the grace period and with it
    /// background refresh.
    pub result_grace_expiration: Duration,

    /// Optional policy for error results. Without one, errors are cached
    /// with the default durations like any other result.
    pub error_expiration: Option<ErrorExpirationPolicy<E>>,
}

impl<E> OpCacheConfig<E> {
    /// Create a config with the given result expiration and no grace period.
    pub fn new(result_expiration: Duration) -> Self {
        Self {
            result_expiration,
            result_grace_expiration: Duration::ZERO,
            error_expiration: None,
        }
    }

    /// Set the grace expiration.
    pub fn with_grace_expiration(mut self, grace_expiration: Duration) -> Self {
        self.result_grace_expiration = grace_expiration;
        self
    }

    /// Set the error expiration policy.
    pub fn with_error_expiration<F>(mut self, policy: F) -> Self
    where
        F: Fn(&E) -> ErrorExpiration + Send + Sync + 'static,
    {
        self.error_expiration = Some(Arc::new(policy));
        self
    }

    /// Returns true if stale results are served during a grace period.
    pub fn grace_enabled(&self) -> bool {
        !self.result_grace_expiration.is_zero()
    }

    /// Create a config from environment variables.
    ///
    /// # Environment Variables
    /// - `{PREFIX}_RESULT_EXPIRATION_MS`: Result expiration (default: 60000)
    /// - `{PREFIX}_RESULT_GRACE_EXPIRATION_MS`: Grace expiration (default: 0)
    ///
    /// The error expiration policy cannot come from the environment; add it
    /// with [`with_error_expiration`](Self::with_error_expiration).
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(prefix, |name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<L>(prefix: &str, lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let result_expiration = millis_var(
            &lookup,
            &format!("{prefix}_{ENV_RESULT_EXPIRATION_SUFFIX}"),
            DEFAULT_RESULT_EXPIRATION_MS,
        )?;
        let result_grace_expiration = millis_var(
            &lookup,
            &format!("{prefix}_{ENV_RESULT_GRACE_EXPIRATION_SUFFIX}"),
            DEFAULT_RESULT_GRACE_EXPIRATION_MS,
        )?;

        Ok(Self {
            result_expiration,
            result_grace_expiration,
            error_expiration: None,
        })
    }
}

impl<E> Clone for OpCacheConfig<E> {
    fn clone(&self) -> Self {
        Self {
            result_expiration: self.result_expiration,
            result_grace_expiration: self.result_grace_expiration,
            error_expiration: self.error_expiration.clone(),
        }
    }
}

impl<E> fmt::Debug for OpCacheConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpCacheConfig")
            .field("result_expiration", &self.result_expiration)
            .field("result_grace_expiration", &self.result_grace_expiration)
            .field("error_expiration", &self.error_expiration.is_some())
            .finish()
    }
}

/// Configuration for the background evictor task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictorConfig {
    /// How often every registered cache is swept (default: 60 seconds)
    pub period: Duration,
}

impl Default for EvictorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(DEFAULT_EVICTOR_PERIOD_MS),
        }
    }
}

impl EvictorConfig {
    /// Create an evictor config with the given period.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Create EvictorConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `OPCACHE_EVICTOR_PERIOD_MS`: Sweep period (default: 60000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let period = millis_var(&lookup, ENV_EVICTOR_PERIOD_MS, DEFAULT_EVICTOR_PERIOD_MS)?;
        if period.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: ENV_EVICTOR_PERIOD_MS.to_string(),
                value: "0".to_string(),
                reason: "period must be positive".to_string(),
            });
        }
        Ok(Self { period })
    }
}

fn millis_var<L>(lookup: &L, name: &str, default_ms: u64) -> Result<Duration, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(Duration::from_millis(default_ms)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
