//! The credential codec interface and its two wire formats.

use crate::error::CodecError;
use crate::key::{CodecKey, IV_LEN};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use std::fmt;

/// Which wire format a codec produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecVariant {
    /// Process-wide IV, hex output.
    FixedIv,
    /// Random IV per call, `base64(iv):base64(body)` output.
    RandomIv,
}

impl fmt::Display for CodecVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedIv => write!(f, "fixed_iv"),
            Self::RandomIv => write!(f, "random_iv"),
        }
    }
}

/// Reversible protection for secret strings.
///
/// Implementors provide [`seal`](Self::seal) and [`open`](Self::open); the
/// string-level [`encrypt`](Self::encrypt) and [`decrypt`](Self::decrypt)
/// wrap them with the empty-in/empty-out and fail-closed conventions callers
/// rely on.
pub trait CredentialCodec: Send + Sync + fmt::Debug {
    /// The wire format this codec produces.
    fn variant(&self) -> CodecVariant;

    /// Encrypts raw bytes into this codec's wire format.
    ///
    /// # Errors
    ///
    /// Returns an error only if the MAC cannot be initialised.
    fn seal(&self, plaintext: &[u8]) -> Result<String, CodecError>;

    /// Verifies and decrypts a value produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed, was produced under another
    /// key, or has been tampered with.
    fn open(&self, sealed: &str) -> Result<Vec<u8>, CodecError>;

    /// Encrypts a string. Empty input yields an empty string.
    fn encrypt(&self, plaintext: &str) -> String {
        if plaintext.is_empty() {
            return String::new();
        }
        match self.seal(plaintext.as_bytes()) {
            Ok(sealed) => sealed,
            Err(e) => {
                tracing::error!(variant = %self.variant(), error = %e, "encryption failed");
                String::new()
            }
        }
    }

    /// Decrypts a string, failing closed.
    ///
    /// Returns an empty string both for empty input and for input that could
    /// not be recovered. Callers must treat empty as "could not recover".
    fn decrypt(&self, ciphertext: &str) -> String {
        if ciphertext.is_empty() {
            return String::new();
        }
        let recovered = self
            .open(ciphertext)
            .and_then(|bytes| String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8));
        match recovered {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::debug!(variant = %self.variant(), error = %e, "decryption failed closed");
                String::new()
            }
        }
    }
}

/// Codec with a process-wide IV and lowercase hex output.
///
/// Equal plaintexts produce equal ciphertexts, which lets stored values be
/// compared without decrypting them.
#[derive(Debug, Clone)]
pub struct FixedIvCodec {
    key: CodecKey,
    iv: [u8; IV_LEN],
}

impl FixedIvCodec {
    /// Creates a codec whose IV is derived from `iv_seed`.
    #[must_use]
    pub fn new(key: CodecKey, iv_seed: &str) -> Self {
        Self {
            key,
            iv: CodecKey::derive_iv(iv_seed),
        }
    }
}

impl CredentialCodec for FixedIvCodec {
    fn variant(&self) -> CodecVariant {
        CodecVariant::FixedIv
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        self.key.seal(&self.iv, plaintext).map(hex::encode)
    }

    fn open(&self, sealed: &str) -> Result<Vec<u8>, CodecError> {
        let body = hex::decode(sealed.trim()).map_err(|e| CodecError::Malformed {
            reason: e.to_string(),
        })?;
        self.key.open(&self.iv, &body)
    }
}

/// Codec with a fresh random IV per call.
///
/// Output is `base64(iv) + ":" + base64(ciphertext || tag)`.
#[derive(Debug, Clone)]
pub struct RandomIvCodec {
    key: CodecKey,
}

impl RandomIvCodec {
    /// Creates a codec over `key`.
    #[must_use]
    pub fn new(key: CodecKey) -> Self {
        Self { key }
    }
}

impl CredentialCodec for RandomIvCodec {
    fn variant(&self) -> CodecVariant {
        CodecVariant::RandomIv
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill(&mut iv);
        let body = self.key.seal(&iv, plaintext)?;
        Ok(format!("{}:{}", STANDARD.encode(iv), STANDARD.encode(body)))
    }

    fn open(&self, sealed: &str) -> Result<Vec<u8>, CodecError> {
        let (iv_part, body_part) =
            sealed
                .trim()
                .split_once(':')
                .ok_or_else(|| CodecError::Malformed {
                    reason: "missing iv separator".to_string(),
                })?;
        let iv_bytes = STANDARD.decode(iv_part).map_err(|e| CodecError::Malformed {
            reason: format!("iv: {e}"),
        })?;
        let iv: [u8; IV_LEN] =
            iv_bytes
                .as_slice()
                .try_into()
                .map_err(|_| CodecError::Malformed {
                    reason: format!("iv must be {IV_LEN} bytes, got {}", iv_bytes.len()),
                })?;
        let body = STANDARD.decode(body_part).map_err(|e| CodecError::Malformed {
            reason: format!("body: {e}"),
        })?;
        self.key.open(&iv, &body)
    }
}
