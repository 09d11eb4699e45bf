//! Cache entries and their validity state machine.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

/// Deadlines are clamped to this far past their base instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Validity of a cached entry at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// `now < expires_at`: authoritative.
    Fresh,
    /// `expires_at <= now < grace_expires_at`: stale but servable.
    Grace,
    /// Past the grace window, or no entry at all.
    Unusable,
}

impl EntryState {
    /// Classify an optional entry.
    pub fn of<T, E>(entry: Option<&CacheEntry<T, E>>, now: Instant) -> Self {
        entry.map_or(Self::Unusable, |entry| entry.state_at(now))
    }
}

/// Immutable snapshot of one operation execution.
#[derive(Debug)]
pub struct CacheEntry<T, E> {
    outcome: Result<T, E>,
    expires_at: Instant,
    grace_expires_at: Instant,
    /// Set once by the caller that owns the background refresh.
    refreshing: RwLock<bool>,
}

impl<T, E> CacheEntry<T, E> {
    /// Create an entry that expires `expiration` from now, with a grace
    /// window of `grace_expiration` after that.
    pub fn new(outcome: Result<T, E>, expiration: Duration, grace_expiration: Duration) -> Self {
        Self::new_at(Instant::now(), outcome, expiration, grace_expiration)
    }

    /// Create an entry as if built at `now`.
    pub fn new_at(
        now: Instant,
        outcome: Result<T, E>,
        expiration: Duration,
        grace_expiration: Duration,
    ) -> Self {
        let expires_at = deadline(now, expiration);
        Self {
            outcome,
            expires_at,
            grace_expires_at: deadline(expires_at, grace_expiration),
            refreshing: RwLock::new(false),
        }
    }

    /// The cached operation outcome.
    pub fn outcome(&self) -> &Result<T, E> {
        &self.outcome
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn grace_expires_at(&self) -> Instant {
        self.grace_expires_at
    }

    /// Validity at `now`.
    pub fn state_at(&self, now: Instant) -> EntryState {
        if now < self.expires_at {
            EntryState::Fresh
        } else if now < self.grace_expires_at {
            EntryState::Grace
        } else {
            EntryState::Unusable
        }
    }

    /// True until the grace window lapses (fresh entries included).
    pub fn is_grace_valid_at(&self, now: Instant) -> bool {
        now < self.grace_expires_at
    }

    /// Try to become the one caller that refreshes this entry.
    ///
    /// Returns true exactly once per entry. The flag is checked under the
    /// shared lock first so concurrent losers never contend for the
    /// exclusive lock, then re-checked under the exclusive lock before it
    /// is set.
    pub fn try_claim_refresh(&self) -> bool {
        if *self.refreshing.read().unwrap_or_else(PoisonError::into_inner) {
            return false;
        }

        let mut refreshing = self.refreshing.write().unwrap_or_else(PoisonError::into_inner);
        if *refreshing {
            // Claimed between our read and write
            return false;
        }
        *refreshing = true;
        true
    }

    /// Returns true if a refresh has been claimed for this entry.
    pub fn is_refreshing(&self) -> bool {
        *self.refreshing.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn deadline(base: Instant, after: Duration) -> Instant {
    base.checked_add(after)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}
