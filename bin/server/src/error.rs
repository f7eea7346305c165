//! Domain error types for server operations.
//!
//! Every error that reaches an HTTP response is converted into a user-safe
//! `{ code, message }` body. Details such as store URLs, database messages or
//! ciphertext stay in the logs.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use botdeck_core::BotId;
use botdeck_guard::GuardRejection;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Errors raised while building the application at startup.
#[derive(Debug)]
pub enum StartupError {
    /// The codec secret is missing or blank.
    InvalidSecret { details: String },
    /// The shared store could not be configured.
    Store { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSecret { details } => write!(f, "invalid codec secret: {details}"),
            Self::Store { details } => write!(f, "rate limit store setup failed: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}

/// Bot lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The submitted credential is empty or unreadable.
    InvalidCredential,
    /// A session for this bot is already live.
    AlreadyRunning { id: BotId },
    /// The bot platform rejected or failed the handshake.
    ConnectFailed { reason: String },
    /// The handshake did not finish in time.
    ConnectTimeout,
    /// No live session exists for this bot.
    NotRunning { id: BotId },
    /// The bot platform failed to deliver a message.
    SendFailed { reason: String },
    /// The bot record could not be written.
    Record { details: String },
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredential => write!(f, "bot credential is invalid"),
            Self::AlreadyRunning { id } => write!(f, "bot {id} is already running"),
            Self::ConnectFailed { reason } => write!(f, "bot connect failed: {reason}"),
            Self::ConnectTimeout => write!(f, "bot connect timed out"),
            Self::NotRunning { id } => write!(f, "bot {id} is not running"),
            Self::SendFailed { reason } => write!(f, "message send failed: {reason}"),
            Self::Record { details } => write!(f, "bot record error: {details}"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// An error returned from an HTTP handler.
#[derive(Debug)]
pub enum ApiError {
    Guard(GuardRejection),
    Service(ServiceError),
    Internal,
}

impl From<GuardRejection> for ApiError {
    fn from(rejection: GuardRejection) -> Self {
        Self::Guard(rejection)
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self::Service(error)
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, ErrorBody) {
        let body = |code, message: String| ErrorBody {
            code,
            message,
            reset_at: None,
        };
        match self {
            Self::Guard(rejection) => {
                let status = match rejection {
                    GuardRejection::MissingOrigin => StatusCode::FORBIDDEN,
                    GuardRejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                    GuardRejection::Validation { .. }
                    | GuardRejection::ForbiddenKey { .. }
                    | GuardRejection::InvalidKeyMaterial => StatusCode::BAD_REQUEST,
                };
                let reset_at = match rejection {
                    GuardRejection::RateLimited { reset_at } => Some(*reset_at),
                    _ => None,
                };
                (
                    status,
                    ErrorBody {
                        code: rejection.code(),
                        message: rejection.to_string(),
                        reset_at,
                    },
                )
            }
            Self::Service(error) => match error {
                ServiceError::InvalidCredential => (
                    StatusCode::BAD_REQUEST,
                    body("invalid_credential", "Bot credential is invalid".into()),
                ),
                ServiceError::AlreadyRunning { id } => (
                    StatusCode::CONFLICT,
                    body("already_running", format!("Bot {id} is already running")),
                ),
                ServiceError::ConnectFailed { .. } => (
                    StatusCode::BAD_GATEWAY,
                    body("connect_failed", "Could not connect to the bot".into()),
                ),
                ServiceError::ConnectTimeout => (
                    StatusCode::GATEWAY_TIMEOUT,
                    body("connect_timeout", "Bot connection timed out".into()),
                ),
                ServiceError::NotRunning { id } => (
                    StatusCode::NOT_FOUND,
                    body("not_running", format!("Bot {id} is not running")),
                ),
                ServiceError::SendFailed { .. } => (
                    StatusCode::BAD_GATEWAY,
                    body("send_failed", "Message could not be delivered".into()),
                ),
                ServiceError::Record { .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    body("internal", "Internal server error".into()),
                ),
            },
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                body("internal", "Internal server error".into()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }
        let retry_after = body
            .reset_at
            .map(|at| (at - Utc::now()).num_seconds().max(1));
        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_display() {
        let err = ServiceError::AlreadyRunning {
            id: BotId::new(1001),
        };
        assert_eq!(err.to_string(), "bot 1001 is already running");
    }

    #[test]
    fn guard_rejections_map_to_statuses() {
        let cases = [
            (GuardRejection::MissingOrigin, StatusCode::FORBIDDEN),
            (
                GuardRejection::Validation {
                    field: "extra".to_string(),
                    message: "unknown field".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                GuardRejection::ForbiddenKey {
                    path: "$where".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (GuardRejection::InvalidKeyMaterial, StatusCode::BAD_REQUEST),
            (
                GuardRejection::RateLimited {
                    reset_at: Utc::now(),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
        ];
        for (rejection, status) in cases {
            let code = rejection.code();
            let (actual, body) = ApiError::from(rejection).parts();
            assert_eq!(actual, status);
            assert_eq!(body.code, code);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let (status, body) = ApiError::from(ServiceError::Record {
            details: "password authentication failed for user botdeck".to_string(),
        })
        .parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.message.contains("password"));

        let (_, body) = ApiError::from(ServiceError::ConnectFailed {
            reason: "https://api.telegram.org/bot123:secret/getMe".to_string(),
        })
        .parts();
        assert!(!body.message.contains("secret"));
    }

    #[test]
    fn rate_limited_response_sets_retry_after() {
        let response = ApiError::from(GuardRejection::RateLimited {
            reset_at: Utc::now() + chrono::Duration::seconds(30),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }
}
