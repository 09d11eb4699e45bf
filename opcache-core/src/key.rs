//! Cache key normalization.
//!
//! Long keys are replaced by a SHA-256 digest so the map never stores or
//! compares them in full. Two distinct long keys with the same digest share
//! a cache slot; no collision detection is done.

use sha2::{Digest, Sha256};
use std::fmt;

/// Keys longer than this many bytes are hashed.
pub const KEY_HASH_THRESHOLD: usize = 100;

/// SHA-256 digest of a long key.
pub type KeyDigest = [u8; 32];

/// Internal identifier of a cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Key stored as given.
    Plain(String),
    /// Digest of a key longer than [`KEY_HASH_THRESHOLD`].
    Digest(KeyDigest),
}

impl CacheKey {
    /// Normalize a caller-supplied key.
    pub fn normalize(key: &str) -> Self {
        if key.len() > KEY_HASH_THRESHOLD {
            Self::Digest(digest_key(key))
        } else {
            Self::Plain(key.to_string())
        }
    }

    /// Returns true if the key was replaced by its digest.
    pub fn is_digest(&self) -> bool {
        matches!(self, Self::Digest(_))
    }
}

fn digest_key(key: &str) -> KeyDigest {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(key) => f.write_str(key),
            Self::Digest(digest) => write!(f, "sha256:{}", hex::encode(digest)),
        }
    }
}
