//! Telegram Bot API connector.
//!
//! The handshake is a `getMe` call. A connected client runs a long-poll
//! `getUpdates` loop in the background that is aborted on disconnect. The
//! loop keeps the session alive and acknowledges inbound updates without
//! handling them; botdeck only sends.
//!
//! Request URLs embed the bot token, so transport errors are always stripped
//! of their URL before they are logged or returned.

use async_trait::async_trait;
use botdeck_core::{BotId, BotToken};
use botdeck_session::{BotClient, BotConnector, BotIdentity, ClientError};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: i64,
    first_name: String,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUpdate {
    update_id: i64,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, ClientError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ClientError::Api {
                message: self
                    .description
                    .unwrap_or_else(|| "request was not successful".to_string()),
            }),
        }
    }
}

fn identity_from(user: ApiUser) -> BotIdentity {
    let display_name = match user.username {
        Some(username) if !username.is_empty() => format!("{} (@{username})", user.first_name),
        _ => user.first_name,
    };
    BotIdentity::new(BotId::new(user.id), display_name)
}

/// `<digits>:<[A-Za-z0-9_-]+>`, the only token shape placed in a request path.
fn is_well_formed(token: &str) -> bool {
    token.split_once(':').is_some_and(|(id, secret)| {
        !id.is_empty()
            && id.bytes().all(|b| b.is_ascii_digit())
            && !secret.is_empty()
            && secret
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    })
}

/// Offset that acknowledges every update in `updates`.
fn next_offset(updates: &[ApiUpdate], current: i64) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .map_or(current, |next| next.max(current))
}

fn transport(e: reqwest::Error) -> ClientError {
    ClientError::Transport {
        message: e.without_url().to_string(),
    }
}

/// Opens Telegram bot sessions.
#[derive(Debug, Clone)]
pub struct TelegramConnector {
    http: reqwest::Client,
    api_url: String,
    poll_timeout: Duration,
}

impl TelegramConnector {
    /// Creates a connector for the Bot API at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: &str, poll_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            poll_timeout,
        })
    }
}

#[async_trait]
impl BotConnector for TelegramConnector {
    async fn connect(&self, token: &BotToken) -> Result<Arc<dyn BotClient>, ClientError> {
        let token = token.expose().trim();
        if !is_well_formed(token) {
            return Err(ClientError::Unauthorized);
        }
        let base = format!("{}/bot{token}", self.api_url);

        let response = self
            .http
            .get(format!("{base}/getMe"))
            .send()
            .await
            .map_err(transport)?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::NOT_FOUND
        {
            return Err(ClientError::Unauthorized);
        }
        let me: ApiResponse<ApiUser> = response.json().await.map_err(transport)?;
        let identity = identity_from(me.into_result()?);

        let poller = tokio::spawn(poll_updates(
            self.http.clone(),
            base.clone(),
            self.poll_timeout,
            identity.id,
        ));

        Ok(Arc::new(TelegramClient {
            identity,
            http: self.http.clone(),
            base,
            poller: Mutex::new(Some(poller)),
        }))
    }
}

/// Long-polls for updates until aborted. Updates are acknowledged and
/// dropped.
async fn poll_updates(http: reqwest::Client, base: String, timeout: Duration, bot_id: BotId) {
    let mut offset: i64 = 0;
    loop {
        let result = http
            .get(format!("{base}/getUpdates"))
            .query(&[
                ("timeout", timeout.as_secs().to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(transport);
        let updates = match result {
            Ok(response) => response
                .json::<ApiResponse<Vec<ApiUpdate>>>()
                .await
                .map_err(transport)
                .and_then(ApiResponse::into_result),
            Err(e) => Err(e),
        };

        match updates {
            Ok(updates) => {
                if !updates.is_empty() {
                    offset = next_offset(&updates, offset);
                    tracing::info!(bot_id = %bot_id, count = updates.len(), offset, "dropped inbound updates");
                }
            }
            Err(e) => {
                tracing::warn!(bot_id = %bot_id, error = %e, "update polling failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}

/// A live Telegram bot session.
struct TelegramClient {
    identity: BotIdentity,
    http: reqwest::Client,
    base: String,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for TelegramClient {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.abort();
        }
    }
}

#[async_trait]
impl BotClient for TelegramClient {
    fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ClientError> {
        if self.poller.lock().is_none() {
            return Err(ClientError::Closed);
        }
        let response: ApiResponse<serde_json::Value> = self
            .http
            .post(format!("{}/sendMessage", self.base))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        response.into_result().map(|_| ())
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        match self.poller.lock().take() {
            Some(poller) => {
                poller.abort();
                Ok(())
            }
            None => Err(ClientError::Closed),
        }
    }
}
