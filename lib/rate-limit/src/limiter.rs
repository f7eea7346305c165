//! Fixed-window rate limiting against a shared store.
//!
//! Each call increments a per-key counter through a server-side script that
//! also arms the window expiry on the first hit, so the increment and the
//! expiry can never be separated by a crash or a concurrent caller.

use crate::error::StoreError;
use crate::store::{KeyValueStore, Ttl};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Increments `KEYS[1]` and arms its expiry to `ARGV[1]` seconds when the
/// increment created it. Returns the new count.
pub const FIXED_WINDOW_SCRIPT: &str = r#"
local current = redis.call("INCR", KEYS[1])
if current == 1 then
    redis.call("EXPIRE", KEYS[1], ARGV[1])
end
return current
"#;

/// Rate limit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub limit: u32,
    /// Window duration in seconds.
    pub window_seconds: u64,
}

impl RateLimitConfig {
    /// Creates a new rate limit configuration.
    #[must_use]
    pub fn new(limit: u32, window_seconds: u64) -> Self {
        Self {
            limit,
            window_seconds,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(5, 120)
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
    /// True when the store was unreachable and the check was skipped.
    pub fail_open: bool,
}

impl RateLimitDecision {
    fn counted(count: i64, limit: u32, ttl_seconds: u64) -> Self {
        let limit_i64 = i64::from(limit);
        let remaining = (limit_i64 - count).clamp(0, limit_i64);
        Self {
            allowed: count <= limit_i64,
            remaining: u32::try_from(remaining).unwrap_or(0),
            reset_at: reset_after(ttl_seconds),
            fail_open: false,
        }
    }

    fn open(limit: u32, window_seconds: u64) -> Self {
        Self {
            allowed: true,
            remaining: limit,
            reset_at: reset_after(window_seconds),
            fail_open: true,
        }
    }
}

/// `now + seconds`, saturating at the latest representable instant.
fn reset_after(seconds: u64) -> DateTime<Utc> {
    let now = Utc::now();
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|window| now.checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A fixed-window rate limiter over a shared store.
///
/// The limiter favours availability: any store failure other than an
/// uncached script results in an allowing decision with `fail_open` set.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    script_sha: String,
    key_prefix: String,
}

impl RateLimiter {
    /// Creates a rate limiter over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            script_sha: botdeck_codec::hash(FIXED_WINDOW_SCRIPT),
            key_prefix: "botdeck:rl".to_string(),
        }
    }

    /// Sets the namespace prepended to every limiter key.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Counts a hit for `key` and decides whether it is within `limit` hits
    /// per `window_seconds`.
    pub async fn allow(&self, key: &str, limit: u32, window_seconds: u64) -> RateLimitDecision {
        let window_seconds = window_seconds.max(1);
        let store_key = format!("{}:{}", self.key_prefix, key);

        match self.check(&store_key, limit, window_seconds).await {
            Ok(decision) => {
                if !decision.allowed {
                    tracing::debug!(limit, window_seconds, "rate limit exceeded");
                }
                decision
            }
            Err(e) => {
                tracing::warn!(error = %e, "rate limit store unavailable, failing open");
                RateLimitDecision::open(limit, window_seconds)
            }
        }
    }

    /// Convenience wrapper taking a [`RateLimitConfig`].
    pub async fn allow_with(&self, key: &str, config: &RateLimitConfig) -> RateLimitDecision {
        self.allow(key, config.limit, config.window_seconds).await
    }

    async fn check(
        &self,
        store_key: &str,
        limit: u32,
        window_seconds: u64,
    ) -> Result<RateLimitDecision, StoreError> {
        let count = self.increment(store_key, window_seconds).await?;

        let ttl_seconds = match self.store.ttl(store_key).await? {
            Ttl::Seconds(seconds) => seconds,
            Ttl::Persistent => {
                tracing::warn!("rate limit counter had no expiry, re-arming window");
                self.store.expire(store_key, window_seconds).await?;
                window_seconds
            }
            Ttl::Missing => window_seconds,
        };

        Ok(RateLimitDecision::counted(count, limit, ttl_seconds))
    }

    async fn increment(&self, store_key: &str, window_seconds: u64) -> Result<i64, StoreError> {
        let window = window_seconds.to_string();
        let keys = [store_key];
        let args = [window.as_str()];

        match self.store.eval_sha(&self.script_sha, &keys, &args).await {
            Err(StoreError::NoScript { .. }) => {
                tracing::debug!(sha = %self.script_sha, "rate limit script not cached, loading");
                self.store.eval(FIXED_WINDOW_SCRIPT, &keys, &args).await
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("script_sha", &self.script_sha)
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
