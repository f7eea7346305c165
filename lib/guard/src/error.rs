//! Typed rejections produced by the request guard.
//!
//! Every rejection carries a stable machine-readable code and a message that
//! is safe to show to the caller. Neither ever contains ciphertext, store
//! details, or decrypted key material.

use chrono::{DateTime, Utc};
use std::fmt;

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardRejection {
    /// The required origin marker header was absent.
    MissingOrigin,
    /// The body did not match the declared schema.
    Validation { field: String, message: String },
    /// The body contained a key that is never accepted.
    ForbiddenKey { path: String },
    /// The key material could not be recovered.
    InvalidKeyMaterial,
    /// The caller exceeded the rate limit.
    RateLimited { reset_at: DateTime<Utc> },
}

impl GuardRejection {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable code for the rejection.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingOrigin => "missing_origin",
            Self::Validation { .. } => "validation",
            Self::ForbiddenKey { .. } => "forbidden_key",
            Self::InvalidKeyMaterial => "invalid_key_material",
            Self::RateLimited { .. } => "rate_limited",
        }
    }
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOrigin => write!(f, "request origin marker is missing"),
            Self::Validation { field, message } => write!(f, "{field}: {message}"),
            Self::ForbiddenKey { path } => write!(f, "forbidden key at {path}"),
            Self::InvalidKeyMaterial => write!(f, "key material is invalid or expired"),
            Self::RateLimited { reset_at } => {
                write!(f, "too many requests, retry after {}", reset_at.to_rfc3339())
            }
        }
    }
}

impl std::error::Error for GuardRejection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_field() {
        let err = GuardRejection::validation("extra", "unknown field");
        assert_eq!(err.code(), "validation");
        assert_eq!(err.to_string(), "extra: unknown field");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(GuardRejection::MissingOrigin.code(), "missing_origin");
        assert_eq!(
            GuardRejection::ForbiddenKey {
                path: "a.$where".to_string()
            }
            .code(),
            "forbidden_key"
        );
        assert_eq!(
            GuardRejection::InvalidKeyMaterial.code(),
            "invalid_key_material"
        );
        assert_eq!(
            GuardRejection::RateLimited {
                reset_at: Utc::now()
            }
            .code(),
            "rate_limited"
        );
    }
}
