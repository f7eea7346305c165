//! HTTP routes.
//!
//! Every mutating route runs its body through the request guard with a
//! closed schema before it reaches the bot service.

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use botdeck_codec::SealedPayload;
use botdeck_core::{BotId, BotToken, UserId};
use botdeck_guard::{FieldRule, GuardRejection, GuardedRequest, RequestSchema, key_material};
use botdeck_session::BotIdentity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Telegram rejects longer messages.
const MAX_MESSAGE_LEN: usize = 4096;
const MAX_PAYLOAD_LEN: usize = 8192;

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/hash-key", get(hash_key))
        .route("/api/bots", get(list_bots))
        .route("/api/bots/start", post(start_bot))
        .route("/api/bots/stop", post(stop_bot))
        .route("/api/bots/message", post(send_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn start_schema() -> RequestSchema {
    RequestSchema::new()
        .field(FieldRule::string("hash_key"))
        .field(FieldRule::string("payload").max_len(MAX_PAYLOAD_LEN))
}

fn stop_schema() -> RequestSchema {
    RequestSchema::new()
        .field(FieldRule::string("hash_key"))
        .field(FieldRule::integer("bot_id"))
}

fn message_schema() -> RequestSchema {
    RequestSchema::new()
        .field(FieldRule::string("hash_key"))
        .field(FieldRule::integer("bot_id"))
        .field(FieldRule::integer("chat_id"))
        .field(FieldRule::string("text").max_len(MAX_MESSAGE_LEN))
}

async fn guarded(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    schema: &RequestSchema,
) -> Result<GuardedRequest, GuardRejection> {
    let origin = headers
        .get(state.guard.policy().origin_header.as_str())
        .and_then(|value| value.to_str().ok());
    let request = state.guard.check(origin, body, schema).await?;
    tracing::debug!(remaining = request.remaining(), "request passed guard");
    Ok(request)
}

#[derive(Debug, Serialize, Deserialize)]
struct HashKeyResponse {
    hash_key: String,
}

async fn hash_key(State(state): State<Arc<AppState>>) -> Result<Json<HashKeyResponse>, ApiError> {
    let hash_key = key_material::issue(state.wire_codec.as_ref()).map_err(|e| {
        tracing::error!(error = %e, "failed to issue key material");
        ApiError::Internal
    })?;
    Ok(Json(HashKeyResponse { hash_key }))
}

async fn list_bots(State(state): State<Arc<AppState>>) -> Json<Vec<BotIdentity>> {
    Json(state.service.list())
}

#[derive(Deserialize)]
struct StartBody {
    payload: String,
}

/// Inner document of the sealed start payload.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StartCredential {
    token: BotToken,
    owner_id: UserId,
}

async fn start_bot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BotIdentity>, ApiError> {
    let request: StartBody = guarded(&state, &headers, &body, &start_schema())
        .await?
        .into_typed()?;
    let credential: StartCredential = SealedPayload {
        payload: request.payload,
    }
    .open(state.wire_codec.as_ref())
    .map_err(|e| {
        tracing::debug!(error = %e, "start payload could not be opened");
        GuardRejection::Validation {
            field: "payload".to_string(),
            message: "could not be opened".to_string(),
        }
    })?;

    let identity = state
        .service
        .start(&credential.token, credential.owner_id)
        .await?;
    tracing::info!(bot_id = %identity.id, owner_id = %credential.owner_id, "bot started");
    Ok(Json(identity))
}

#[derive(Deserialize)]
struct StopBody {
    bot_id: BotId,
}

#[derive(Debug, Serialize, Deserialize)]
struct StopResponse {
    stopped: bool,
}

async fn stop_bot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StopResponse>, ApiError> {
    let request: StopBody = guarded(&state, &headers, &body, &stop_schema())
        .await?
        .into_typed()?;
    let stopped = state.service.stop(request.bot_id).await;
    tracing::info!(bot_id = %request.bot_id, stopped, "bot stop requested");
    Ok(Json(StopResponse { stopped }))
}

#[derive(Deserialize)]
struct MessageBody {
    bot_id: BotId,
    chat_id: i64,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct MessageResponse {
    sent: bool,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let request: MessageBody = guarded(&state, &headers, &body, &message_schema())
        .await?
        .into_typed()?;
    state
        .service
        .send_message(request.bot_id, request.chat_id, &request.text)
        .await?;
    Ok(Json(MessageResponse { sent: true }))
}
