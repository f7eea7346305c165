//! Bot lifecycle orchestration.
//!
//! [`BotService`] ties the session registry to the persisted bot records:
//!
//! - `start` bounds the handshake with a timeout, then records the bot as
//!   active with its token sealed for storage. If the record cannot be
//!   written the new session is stopped again.
//! - `stop` marks the record stopped once the session is gone.
//! - `restore` restarts this worker's active bots after a restart.
//! - `shutdown` disconnects every session but leaves records active so the
//!   next start restores them.
//!
//! Record writes for one bot are serialized with the registry change that
//! caused them, so a stop racing a start cannot leave a live session behind
//! a `stopped` record.

use crate::db::{BotRecord, BotRecordStore};
use crate::error::ServiceError;
use botdeck_codec::CredentialCodec;
use botdeck_core::{BotId, BotToken, UserId, WorkerId};
use botdeck_session::{BotIdentity, SessionError, SessionRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type RecordLock = Arc<tokio::sync::Mutex<()>>;

/// Outcome of restoring persisted bots at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: usize,
    pub failed: usize,
}

/// Orchestrates bot sessions and their records.
pub struct BotService {
    registry: Arc<SessionRegistry>,
    records: Arc<dyn BotRecordStore>,
    storage_codec: Arc<dyn CredentialCodec>,
    worker_id: WorkerId,
    handshake_timeout: Duration,
    record_locks: Mutex<HashMap<BotId, RecordLock>>,
}

impl BotService {
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        records: Arc<dyn BotRecordStore>,
        storage_codec: Arc<dyn CredentialCodec>,
        worker_id: WorkerId,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            records,
            storage_codec,
            worker_id,
            handshake_timeout,
            record_locks: Mutex::new(HashMap::new()),
        }
    }

    fn record_lock(&self, id: BotId) -> RecordLock {
        Arc::clone(self.record_locks.lock().entry(id).or_default())
    }

    /// Starts a bot for `owner` and records it as active.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails or times out, if the bot is
    /// already running, if it was stopped before its record was written, or
    /// if the record cannot be written.
    pub async fn start(&self, token: &BotToken, owner: UserId) -> Result<BotIdentity, ServiceError> {
        if token.is_empty() {
            return Err(ServiceError::InvalidCredential);
        }
        let identity = self.connect(token).await?;

        let lock = self.record_lock(identity.id);
        let _held = lock.lock().await;
        if self.registry.get(identity.id).is_none() {
            tracing::info!(bot_id = %identity.id, "bot stopped while starting, record left as is");
            return Err(ServiceError::NotRunning { id: identity.id });
        }

        let encrypted_token = self.storage_codec.encrypt(token.expose());
        let written = if encrypted_token.is_empty() {
            Err(ServiceError::Record {
                details: "token could not be sealed".to_string(),
            })
        } else {
            let record = BotRecord::active(
                identity.id,
                identity.display_name.clone(),
                encrypted_token,
                owner,
                self.worker_id.clone(),
            );
            self.records
                .upsert(&record)
                .await
                .map_err(|e| ServiceError::Record {
                    details: e.to_string(),
                })
        };

        if let Err(e) = written {
            tracing::error!(bot_id = %identity.id, error = %e, "bot record write failed, stopping session");
            self.registry.stop(identity.id).await;
            return Err(e);
        }
        Ok(identity)
    }

    async fn connect(&self, token: &BotToken) -> Result<BotIdentity, ServiceError> {
        match tokio::time::timeout(self.handshake_timeout, self.registry.start(token)).await {
            Ok(Ok(identity)) => Ok(identity),
            Ok(Err(SessionError::AlreadyRunning { id })) => Err(ServiceError::AlreadyRunning { id }),
            Ok(Err(SessionError::ConnectFailed { source })) => Err(ServiceError::ConnectFailed {
                reason: source.to_string(),
            }),
            Err(_) => {
                tracing::warn!(timeout = ?self.handshake_timeout, "bot handshake timed out");
                Err(ServiceError::ConnectTimeout)
            }
        }
    }

    /// Stops a bot. Returns `false` if it was not running.
    pub async fn stop(&self, id: BotId) -> bool {
        let lock = self.record_lock(id);
        let _held = lock.lock().await;
        if !self.registry.stop(id).await {
            return false;
        }
        if let Err(e) = self.records.mark_stopped(id).await {
            tracing::warn!(bot_id = %id, error = %e, "failed to mark bot record stopped");
        }
        true
    }

    /// Running bots.
    #[must_use]
    pub fn list(&self) -> Vec<BotIdentity> {
        self.registry.list()
    }

    /// Relays a text message through a running bot.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotRunning`] if the bot has no live session and
    /// [`ServiceError::SendFailed`] if the platform rejects the message.
    pub async fn send_message(&self, id: BotId, chat_id: i64, text: &str) -> Result<(), ServiceError> {
        let client = self
            .registry
            .get(id)
            .ok_or(ServiceError::NotRunning { id })?;
        client
            .send_message(chat_id, text)
            .await
            .map_err(|e| ServiceError::SendFailed {
                reason: e.to_string(),
            })
    }

    /// Restarts the active bots recorded for this worker.
    ///
    /// Bots whose token cannot be recovered or whose handshake fails are
    /// marked stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be listed.
    pub async fn restore(&self) -> Result<RestoreSummary, ServiceError> {
        let records = self
            .records
            .list_active(&self.worker_id)
            .await
            .map_err(|e| ServiceError::Record {
                details: e.to_string(),
            })?;

        let mut summary = RestoreSummary::default();
        for record in records {
            let token = BotToken::new(self.storage_codec.decrypt(&record.encrypted_token));
            let outcome = if token.is_empty() {
                Err(ServiceError::InvalidCredential)
            } else {
                self.connect(&token).await
            };

            match outcome {
                Ok(identity) if identity.id == record.id => summary.restored += 1,
                Err(ServiceError::AlreadyRunning { id }) if id == record.id => {
                    summary.restored += 1;
                }
                Err(ServiceError::AlreadyRunning { id }) => {
                    tracing::warn!(
                        bot_id = %record.id,
                        running_as = %id,
                        "restored token belongs to another running bot"
                    );
                    self.mark_restore_failed(record.id).await;
                    summary.failed += 1;
                }
                Ok(identity) => {
                    tracing::warn!(
                        bot_id = %record.id,
                        connected_as = %identity.id,
                        "restored token belongs to another bot, stopping"
                    );
                    self.registry.stop(identity.id).await;
                    self.mark_restore_failed(record.id).await;
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(bot_id = %record.id, error = %e, "bot restore failed");
                    self.mark_restore_failed(record.id).await;
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            worker_id = %self.worker_id,
            restored = summary.restored,
            failed = summary.failed,
            "bot restore finished"
        );
        Ok(summary)
    }

    async fn mark_restore_failed(&self, id: BotId) {
        if let Err(e) = self.records.mark_stopped(id).await {
            tracing::warn!(bot_id = %id, error = %e, "failed to mark bot record stopped");
        }
    }

    /// Disconnects every live session, leaving records active.
    pub async fn shutdown(&self) -> usize {
        let stopped = self.registry.stop_all().await;
        tracing::info!(stopped, "bot sessions disconnected");
        stopped
    }
}
