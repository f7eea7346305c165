//! Persisted bot records.
//!
//! A record exists for every bot that has ever been started. Its status
//! mirrors the session registry: `active` while a session runs (or should be
//! restored after a restart), `stopped` once it was stopped explicitly.

use async_trait::async_trait;
use botdeck_core::{BotId, UserId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a bot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Active,
    Stopped,
}

impl BotStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Stopped => "stopped",
        }
    }

    fn from_str_value(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            _ => Self::Stopped,
        }
    }
}

/// A bot record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotRecord {
    pub id: BotId,
    pub display_name: String,
    /// Token sealed with the fixed-IV codec.
    pub encrypted_token: String,
    pub owner_id: UserId,
    pub status: BotStatus,
    pub worker_id: WorkerId,
    pub updated_at: DateTime<Utc>,
}

impl BotRecord {
    /// Creates an active record.
    #[must_use]
    pub fn active(
        id: BotId,
        display_name: String,
        encrypted_token: String,
        owner_id: UserId,
        worker_id: WorkerId,
    ) -> Self {
        Self {
            id,
            display_name,
            encrypted_token,
            owner_id,
            status: BotStatus::Active,
            worker_id,
            updated_at: Utc::now(),
        }
    }
}

/// Errors from bot record storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The database rejected or failed the query.
    Database { details: String },
    /// A stored row could not be decoded.
    Decode { details: String },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => write!(f, "bot record database error: {details}"),
            Self::Decode { details } => write!(f, "invalid bot record: {details}"),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<sqlx::Error> for RecordError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database {
            details: e.to_string(),
        }
    }
}

/// Storage for bot records.
///
/// This abstraction allows testing the bot service without Postgres.
#[async_trait]
pub trait BotRecordStore: Send + Sync {
    /// Inserts or replaces the record for `record.id`.
    async fn upsert(&self, record: &BotRecord) -> Result<(), RecordError>;

    /// Marks the record for `id` as stopped. Missing records are ignored.
    async fn mark_stopped(&self, id: BotId) -> Result<(), RecordError>;

    /// Lists active records assigned to `worker`.
    async fn list_active(&self, worker: &WorkerId) -> Result<Vec<BotRecord>, RecordError>;
}

/// Row type for bot record queries.
#[derive(FromRow)]
struct BotRow {
    id: i64,
    display_name: String,
    encrypted_token: String,
    owner_id: String,
    status: String,
    worker_id: String,
    updated_at: DateTime<Utc>,
}

impl BotRow {
    fn try_into_record(self) -> Result<BotRecord, RecordError> {
        let owner_id = UserId::from_str(&self.owner_id).map_err(|e| RecordError::Decode {
            details: format!("bot {}: {e}", self.id),
        })?;

        Ok(BotRecord {
            id: BotId::new(self.id),
            display_name: self.display_name,
            encrypted_token: self.encrypted_token,
            owner_id,
            status: BotStatus::from_str_value(&self.status),
            worker_id: WorkerId::new(self.worker_id),
            updated_at: self.updated_at,
        })
    }
}

/// Postgres-backed bot record repository.
pub struct BotRepository {
    pool: PgPool,
}

impl BotRepository {
    /// Creates a new repository.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BotRecordStore for BotRepository {
    async fn upsert(&self, record: &BotRecord) -> Result<(), RecordError> {
        sqlx::query(
            r#"
            INSERT INTO bots
                (id, display_name, encrypted_token, owner_id, status, worker_id, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                encrypted_token = EXCLUDED.encrypted_token,
                owner_id = EXCLUDED.owner_id,
                status = EXCLUDED.status,
                worker_id = EXCLUDED.worker_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.id.get())
        .bind(&record.display_name)
        .bind(&record.encrypted_token)
        .bind(record.owner_id.to_string())
        .bind(record.status.as_str())
        .bind(record.worker_id.as_str())
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_stopped(&self, id: BotId) -> Result<(), RecordError> {
        sqlx::query(
            r#"
            UPDATE bots
            SET status = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(BotStatus::Stopped.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_active(&self, worker: &WorkerId) -> Result<Vec<BotRecord>, RecordError> {
        let rows: Vec<BotRow> = sqlx::query_as(
            r#"
            SELECT id, display_name, encrypted_token, owner_id, status, worker_id, updated_at
            FROM bots
            WHERE worker_id = $1 AND status = $2
            ORDER BY id ASC
            "#,
        )
        .bind(worker.as_str())
        .bind(BotStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BotRow::try_into_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_value() {
        for status in [BotStatus::Active, BotStatus::Stopped] {
            assert_eq!(BotStatus::from_str_value(status.as_str()), status);
        }
        assert_eq!(BotStatus::from_str_value("garbage"), BotStatus::Stopped);
    }

    #[test]
    fn row_decodes_into_record() {
        let owner = UserId::new();
        let row = BotRow {
            id: 1001,
            display_name: "Deck Bot".to_string(),
            encrypted_token: "abcd".to_string(),
            owner_id: owner.to_string(),
            status: "active".to_string(),
            worker_id: "worker-1".to_string(),
            updated_at: Utc::now(),
        };
        let record = row.try_into_record().expect("decode");
        assert_eq!(record.id, BotId::new(1001));
        assert_eq!(record.owner_id, owner);
        assert_eq!(record.status, BotStatus::Active);
        assert_eq!(record.worker_id, WorkerId::new("worker-1"));
    }

    #[test]
    fn row_with_bad_owner_fails_to_decode() {
        let row = BotRow {
            id: 1,
            display_name: String::new(),
            encrypted_token: String::new(),
            owner_id: "not-a-ulid".to_string(),
            status: "active".to_string(),
            worker_id: "worker-1".to_string(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            row.try_into_record(),
            Err(RecordError::Decode { .. })
        ));
    }
}
