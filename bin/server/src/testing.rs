//! In-memory fakes shared by the server tests.

use crate::config::{BotsConfig, CodecConfig, GuardConfig, ServerConfig};
use crate::db::{BotRecord, BotRecordStore, BotStatus, RecordError};
use async_trait::async_trait;
use botdeck_codec::{CodecKey, CredentialCodec, FixedIvCodec};
use botdeck_core::{BotId, BotToken, WorkerId};
use botdeck_session::{BotClient, BotConnector, BotIdentity, ClientError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub(crate) type SentMessages = Arc<Mutex<Vec<(BotId, i64, String)>>>;

pub(crate) fn test_config(secret: &str, redis_url: Option<&str>) -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        database_url: "postgres://localhost/botdeck".to_string(),
        redis_url: redis_url.map(str::to_owned),
        worker_id: "worker-1".to_string(),
        codec: CodecConfig {
            secret: secret.to_string(),
            fixed_iv_seed: None,
        },
        guard: GuardConfig::default(),
        bots: BotsConfig::default(),
    }
}

pub(crate) fn storage_codec() -> Arc<dyn CredentialCodec> {
    Arc::new(FixedIvCodec::new(
        CodecKey::derive("test-secret").expect("derive"),
        "test-secret",
    ))
}

/// Accepts tokens shaped `<id>:<anything>`.
/// Connects are delayed by the queued durations in order; once the queue
/// is empty they complete immediately.
#[derive(Default)]
pub(crate) struct FakeConnector {
    delays: Mutex<VecDeque<Duration>>,
    sent: SentMessages,
}

impl FakeConnector {
    pub(crate) fn with_delays(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            delays: Mutex::new(delays.into_iter().collect()),
            ..Self::default()
        }
    }

    pub(crate) fn sent(&self) -> SentMessages {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl BotConnector for FakeConnector {
    async fn connect(&self, token: &BotToken) -> Result<Arc<dyn BotClient>, ClientError> {
        let delay = self.delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let id: i64 = token
            .expose()
            .split_once(':')
            .and_then(|(id, _)| id.parse().ok())
            .ok_or(ClientError::Unauthorized)?;
        Ok(Arc::new(FakeClient {
            identity: BotIdentity::new(BotId::new(id), format!("bot{id}")),
            sent: Arc::clone(&self.sent),
        }))
    }
}

struct FakeClient {
    identity: BotIdentity,
    sent: SentMessages,
}

#[async_trait]
impl BotClient for FakeClient {
    fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ClientError> {
        if text == "fail" {
            return Err(ClientError::Api {
                message: "Bad Request: chat not found".to_string(),
            });
        }
        self.sent
            .lock()
            .push((self.identity.id, chat_id, text.to_string()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Record store backed by a map.
#[derive(Default)]
pub(crate) struct MemoryRecords {
    records: Mutex<BTreeMap<BotId, BotRecord>>,
    fail_writes: bool,
    mark_stopped_delay: Option<Duration>,
}

impl MemoryRecords {
    pub(crate) fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_slow_mark_stopped(delay: Duration) -> Self {
        Self {
            mark_stopped_delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn insert(&self, record: BotRecord) {
        self.records.lock().insert(record.id, record);
    }

    pub(crate) fn get(&self, id: BotId) -> Option<BotRecord> {
        self.records.lock().get(&id).cloned()
    }

    fn check_writable(&self) -> Result<(), RecordError> {
        if self.fail_writes {
            return Err(RecordError::Database {
                details: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BotRecordStore for MemoryRecords {
    async fn upsert(&self, record: &BotRecord) -> Result<(), RecordError> {
        self.check_writable()?;
        self.insert(record.clone());
        Ok(())
    }

    async fn mark_stopped(&self, id: BotId) -> Result<(), RecordError> {
        if let Some(delay) = self.mark_stopped_delay {
            tokio::time::sleep(delay).await;
        }
        self.check_writable()?;
        if let Some(record) = self.records.lock().get_mut(&id) {
            record.status = BotStatus::Stopped;
        }
        Ok(())
    }

    async fn list_active(&self, worker: &WorkerId) -> Result<Vec<BotRecord>, RecordError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.status == BotStatus::Active && &r.worker_id == worker)
            .cloned()
            .collect())
    }
}
