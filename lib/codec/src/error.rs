//! Error types for the codec crate.
//!
//! Messages never include the offending ciphertext or key bytes.

use std::fmt;

/// Errors from credential codec operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No secret was configured to derive the key from.
    MissingSecret,
    /// Input is not in the codec's wire format.
    Malformed { reason: String },
    /// The authentication tag did not match.
    IntegrityCheckFailed,
    /// The cipher rejected the input after the tag was verified.
    DecryptionFailed { reason: String },
    /// The recovered plaintext was not valid UTF-8.
    InvalidUtf8,
    /// A sealed payload could not be (de)serialized.
    Serialization { reason: String },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSecret => write!(f, "codec secret is not configured"),
            Self::Malformed { reason } => write!(f, "malformed ciphertext: {reason}"),
            Self::IntegrityCheckFailed => write!(f, "ciphertext failed integrity check"),
            Self::DecryptionFailed { reason } => write!(f, "decryption failed: {reason}"),
            Self::InvalidUtf8 => write!(f, "decrypted value is not valid UTF-8"),
            Self::Serialization { reason } => {
                write!(f, "sealed payload serialization failed: {reason}")
            }
        }
    }
}

impl std::error::Error for CodecError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display_includes_reason() {
        let err = CodecError::Malformed {
            reason: "missing separator".to_string(),
        };
        assert!(err.to_string().contains("malformed"));
        assert!(err.to_string().contains("missing separator"));
    }

    #[test]
    fn missing_secret_display() {
        assert!(CodecError::MissingSecret.to_string().contains("secret"));
    }
}
