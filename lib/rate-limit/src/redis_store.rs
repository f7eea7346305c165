//! Redis-backed key-value store.

use crate::error::StoreError;
use crate::store::{KeyValueStore, Ttl};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use rootcause::prelude::Report;
use tokio::sync::OnceCell;

/// A [`KeyValueStore`] over a Redis server.
///
/// The connection is opened on first use and re-established by the
/// connection manager after failures, so a Redis outage at startup does not
/// prevent the server from booting.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Creates a store for the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not a valid Redis connection string.
    pub fn new(url: &str) -> Result<Self, Report<StoreError>> {
        let client = redis::Client::open(url).map_err(|e| StoreError::InvalidConfig {
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .cloned()
            .map_err(unavailable)
    }

    async fn run_script(
        &self,
        command: &str,
        script: &str,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd(command);
        cmd.arg(script).arg(keys.len());
        for key in keys {
            cmd.arg(*key);
        }
        for arg in args {
            cmd.arg(*arg);
        }
        let reply: i64 = cmd.query_async(&mut conn).await.map_err(|e| {
            if e.kind() == redis::ErrorKind::NoScriptError {
                StoreError::NoScript {
                    sha: script.to_string(),
                }
            } else {
                unavailable(e)
            }
        })?;
        Ok(reply)
    }
}

fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable {
        reason: e.to_string(),
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn eval_sha(
        &self,
        sha: &str,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        self.run_script("EVALSHA", sha, keys, args).await
    }

    async fn eval(
        &self,
        script: &str,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        self.run_script("EVAL", script, keys, args).await
    }

    async fn ttl(&self, key: &str) -> Result<Ttl, StoreError> {
        let mut conn = self.connection().await?;
        let reply: i64 = redis::cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(Ttl::from_reply(reply))
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.conn.initialized())
            .finish_non_exhaustive()
    }
}
