//! Error types for the rate-limit crate.

use std::fmt;

/// Errors from the shared key-value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store has no cached script for the given digest.
    NoScript { sha: String },
    /// The store could not be reached or the command failed.
    Unavailable { reason: String },
    /// The store refused to run a script.
    ScriptRejected { reason: String },
    /// The store configuration is invalid.
    InvalidConfig { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoScript { sha } => write!(f, "no cached script for {sha}"),
            Self::Unavailable { reason } => write!(f, "store unavailable: {reason}"),
            Self::ScriptRejected { reason } => write!(f, "script rejected: {reason}"),
            Self::InvalidConfig { reason } => write!(f, "invalid store configuration: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}
