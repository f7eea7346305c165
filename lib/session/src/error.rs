//! Error types for the session crate.

use botdeck_core::BotId;
use std::fmt;

/// Errors from a bot platform client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The platform rejected the credential.
    Unauthorized,
    /// The platform could not be reached.
    Transport { message: String },
    /// The platform answered with an error.
    Api { message: String },
    /// The connection has already been closed.
    Closed,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "bot credential was rejected"),
            Self::Transport { message } => write!(f, "bot platform unreachable: {message}"),
            Self::Api { message } => write!(f, "bot platform error: {message}"),
            Self::Closed => write!(f, "bot connection is closed"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Errors from session registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A session for this bot is already registered.
    AlreadyRunning { id: BotId },
    /// The handshake failed; nothing was registered.
    ConnectFailed { source: ClientError },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning { id } => write!(f, "bot {id} is already running"),
            Self::ConnectFailed { source } => write!(f, "bot connect failed: {source}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConnectFailed { source } => Some(source),
            Self::AlreadyRunning { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_running_names_bot() {
        let err = SessionError::AlreadyRunning {
            id: BotId::new(1001),
        };
        assert_eq!(err.to_string(), "bot 1001 is already running");
    }

    #[test]
    fn connect_failed_wraps_client_error() {
        let err = SessionError::ConnectFailed {
            source: ClientError::Unauthorized,
        };
        assert!(err.to_string().contains("rejected"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
