//! Capabilities supplied by a bot platform integration.

use crate::error::ClientError;
use async_trait::async_trait;
use botdeck_core::{BotId, BotToken};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who a bot is, as reported by the platform after a handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub id: BotId,
    pub display_name: String,
}

impl BotIdentity {
    #[must_use]
    pub fn new(id: BotId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Opens authenticated connections to the bot platform.
#[async_trait]
pub trait BotConnector: Send + Sync {
    /// Authenticates `token` and returns a live client.
    ///
    /// May take seconds. Callers bound it with their own timeout.
    async fn connect(&self, token: &BotToken) -> Result<Arc<dyn BotClient>, ClientError>;
}

/// A live, authenticated connection for one bot.
#[async_trait]
pub trait BotClient: Send + Sync {
    /// Identity established during the handshake.
    fn identity(&self) -> &BotIdentity;

    /// Sends a text message to a chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ClientError>;

    /// Closes the connection and stops any background work.
    async fn disconnect(&self) -> Result<(), ClientError>;
}
