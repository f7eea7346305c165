//! In-process key-value store.
//!
//! Suitable for single-node deployments and tests. It implements the
//! fixed-window counter script natively and rejects any other script body,
//! and it keeps a script cache so `EVALSHA` misses behave as on Redis.

use crate::error::StoreError;
use crate::limiter::FIXED_WINDOW_SCRIPT;
use crate::store::{KeyValueStore, Ttl};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Longest expiry the store arms; longer windows are clamped.
const MAX_EXPIRY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry_after(now: Instant, seconds: u64) -> Instant {
    now + Duration::from_secs(seconds).min(MAX_EXPIRY)
}

#[derive(Debug, Clone)]
struct Counter {
    count: i64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct State {
    counters: HashMap<String, Counter>,
    scripts: HashSet<String>,
}

impl State {
    fn live_counter(&mut self, key: &str, now: Instant) -> Option<&mut Counter> {
        if self.counters.get(key).is_some_and(|c| c.is_expired(now)) {
            self.counters.remove(key);
        }
        self.counters.get_mut(key)
    }
}

/// A key-value store held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn run_fixed_window(&self, keys: &[&str], args: &[&str]) -> Result<i64, StoreError> {
        let key = keys.first().ok_or_else(|| StoreError::ScriptRejected {
            reason: "fixed window script needs one key".to_string(),
        })?;
        let window: u64 = args
            .first()
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| StoreError::ScriptRejected {
                reason: "fixed window script needs a window argument".to_string(),
            })?;

        let now = Instant::now();
        let mut state = self.state.lock();
        let count = match state.live_counter(key, now) {
            Some(counter) => {
                counter.count += 1;
                counter.count
            }
            None => {
                state.counters.insert(
                    (*key).to_string(),
                    Counter {
                        count: 1,
                        expires_at: Some(expiry_after(now, window)),
                    },
                );
                1
            }
        };
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) fn insert_persistent(&self, key: &str, count: i64) {
        self.state.lock().counters.insert(
            key.to_string(),
            Counter {
                count,
                expires_at: None,
            },
        );
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn eval_sha(&self, sha: &str, keys: &[&str], args: &[&str]) -> Result<i64, StoreError> {
        if !self.state.lock().scripts.contains(sha) {
            return Err(StoreError::NoScript {
                sha: sha.to_string(),
            });
        }
        self.run_fixed_window(keys, args)
    }

    async fn eval(&self, script: &str, keys: &[&str], args: &[&str]) -> Result<i64, StoreError> {
        if script != FIXED_WINDOW_SCRIPT {
            return Err(StoreError::ScriptRejected {
                reason: "memory store only runs the fixed window script".to_string(),
            });
        }
        self.state.lock().scripts.insert(botdeck_codec::hash(script));
        self.run_fixed_window(keys, args)
    }

    async fn ttl(&self, key: &str) -> Result<Ttl, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let ttl = match state.live_counter(key, now) {
            None => Ttl::Missing,
            Some(Counter {
                expires_at: None, ..
            }) => Ttl::Persistent,
            Some(Counter {
                expires_at: Some(at),
                ..
            }) => {
                let left = at.saturating_duration_since(now);
                let seconds = left.as_secs() + u64::from(left.subsec_nanos() > 0);
                Ttl::Seconds(seconds)
            }
        };
        Ok(ttl)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let now = Instant::now();
        if let Some(counter) = self.state.lock().live_counter(key, now) {
            counter.expires_at = Some(expiry_after(now, seconds));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha() -> String {
        botdeck_codec::hash(FIXED_WINDOW_SCRIPT)
    }

    #[tokio::test(start_paused = true)]
    async fn eval_sha_misses_until_script_loaded() {
        let store = MemoryStore::new();
        let err = store.eval_sha(&sha(), &["k"], &["60"]).await.unwrap_err();
        assert!(matches!(err, StoreError::NoScript { .. }));

        assert_eq!(store.eval(FIXED_WINDOW_SCRIPT, &["k"], &["60"]).await, Ok(1));
        assert_eq!(store.eval_sha(&sha(), &["k"], &["60"]).await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_scripts_are_rejected() {
        let store = MemoryStore::new();
        let err = store
            .eval("return 1", &["k"], &["60"])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ScriptRejected { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn first_hit_arms_expiry() {
        let store = MemoryStore::new();
        store
            .eval(FIXED_WINDOW_SCRIPT, &["k"], &["60"])
            .await
            .expect("eval");
        assert_eq!(store.ttl("k").await, Ok(Ttl::Seconds(60)));

        tokio::time::advance(Duration::from_secs(45)).await;
        store
            .eval(FIXED_WINDOW_SCRIPT, &["k"], &["60"])
            .await
            .expect("eval");
        assert_eq!(store.ttl("k").await, Ok(Ttl::Seconds(15)));

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(store.ttl("k").await, Ok(Ttl::Missing));
    }

    #[tokio::test(start_paused = true)]
    async fn expire_rearms_persistent_counter() {
        let store = MemoryStore::new();
        store.insert_persistent("k", 3);
        assert_eq!(store.ttl("k").await, Ok(Ttl::Persistent));
        store.expire("k", 30).await.expect("expire");
        assert_eq!(store.ttl("k").await, Ok(Ttl::Seconds(30)));
    }

    #[tokio::test]
    async fn expire_on_missing_key_is_noop() {
        let store = MemoryStore::new();
        store.expire("missing", 30).await.expect("expire");
        assert_eq!(store.ttl("missing").await, Ok(Ttl::Missing));
    }
}
