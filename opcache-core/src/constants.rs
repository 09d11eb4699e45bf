//! Default values and environment variable names.

/// Default result expiration when none is configured (1 minute).
pub const DEFAULT_RESULT_EXPIRATION_MS: u64 = 60_000;

/// Default grace expiration. Zero disables background refresh.
pub const DEFAULT_RESULT_GRACE_EXPIRATION_MS: u64 = 0;

/// Default evictor sweep period (1 minute).
pub const DEFAULT_EVICTOR_PERIOD_MS: u64 = 60_000;

/// Suffix appended to a cache prefix for the result expiration variable.
pub const ENV_RESULT_EXPIRATION_SUFFIX: &str = "RESULT_EXPIRATION_MS";

/// Suffix appended to a cache prefix for the grace expiration variable.
pub const ENV_RESULT_GRACE_EXPIRATION_SUFFIX: &str = "RESULT_GRACE_EXPIRATION_MS";

/// Environment variable for the evictor sweep period.
pub const ENV_EVICTOR_PERIOD_MS: &str = "OPCACHE_EVICTOR_PERIOD_MS";
