//! The shared key-value store capability.

use crate::error::StoreError;
use async_trait::async_trait;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist.
    Missing,
    /// The key exists but has no expiry.
    Persistent,
    /// The key expires after this many seconds.
    Seconds(u64),
}

impl Ttl {
    /// Interprets a Redis `TTL` reply.
    #[must_use]
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            -1 => Self::Persistent,
            r if r < 0 => Self::Missing,
            r => Self::Seconds(r.unsigned_abs()),
        }
    }
}

/// Operations the rate limiter needs from a shared store.
///
/// Scripts run atomically on the store. Implementations must report an
/// uncached digest as [`StoreError::NoScript`] so callers can resubmit the
/// script body.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Runs a previously loaded script by its SHA-1 digest.
    async fn eval_sha(&self, sha: &str, keys: &[&str], args: &[&str]) -> Result<i64, StoreError>;

    /// Runs a script by its body, caching it on the store.
    async fn eval(&self, script: &str, keys: &[&str], args: &[&str]) -> Result<i64, StoreError>;

    /// Returns the remaining lifetime of `key`.
    async fn ttl(&self, key: &str) -> Result<Ttl, StoreError>;

    /// Sets `key` to expire after `seconds`.
    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_reply_mapping() {
        assert_eq!(Ttl::from_reply(-2), Ttl::Missing);
        assert_eq!(Ttl::from_reply(-1), Ttl::Persistent);
        assert_eq!(Ttl::from_reply(0), Ttl::Seconds(0));
        assert_eq!(Ttl::from_reply(42), Ttl::Seconds(42));
    }
}
