//! Encrypted JSON documents moving between the web tier and the backend.
//!
//! A request carrying secrets sends `{ "payload": "<sealed string>" }`. The
//! receiver opens it and deserializes the inner JSON into its own type, which
//! should use `#[serde(deny_unknown_fields)]` so the inner document is
//! re-validated instead of trusted.

use crate::codec::CredentialCodec;
use crate::error::CodecError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An encrypted JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    /// Codec-produced ciphertext of the inner JSON.
    pub payload: String,
}

impl SealedPayload {
    /// Serializes `value` to JSON and seals it.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized or sealed.
    pub fn seal<T: Serialize>(
        codec: &dyn CredentialCodec,
        value: &T,
    ) -> Result<Self, CodecError> {
        let json = serde_json::to_vec(value).map_err(|e| CodecError::Serialization {
            reason: e.to_string(),
        })?;
        Ok(Self {
            payload: codec.seal(&json)?,
        })
    }

    /// Opens the payload and deserializes the inner JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is empty, cannot be decrypted, or does
    /// not match `T`.
    pub fn open<T: DeserializeOwned>(&self, codec: &dyn CredentialCodec) -> Result<T, CodecError> {
        if self.payload.is_empty() {
            return Err(CodecError::Malformed {
                reason: "empty payload".to_string(),
            });
        }
        let json = codec.open(&self.payload)?;
        serde_json::from_slice(&json).map_err(|e| CodecError::Serialization {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CodecKey, RandomIvCodec};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Login {
        token: String,
    }

    #[derive(Serialize)]
    struct LoginWithExtra {
        token: String,
        admin: bool,
    }

    fn codec() -> RandomIvCodec {
        RandomIvCodec::new(CodecKey::derive("payload-secret").expect("derive"))
    }

    #[test]
    fn sealed_payload_opens_to_same_value() {
        let codec = codec();
        let sealed = SealedPayload::seal(
            &codec,
            &Login {
                token: "1:abc".to_string(),
            },
        )
        .expect("seal");
        assert!(!sealed.payload.contains("1:abc"));
        let opened: Login = sealed.open(&codec).expect("open");
        assert_eq!(opened.token, "1:abc");
    }

    #[test]
    fn inner_document_is_revalidated() {
        let codec = codec();
        let sealed = SealedPayload::seal(
            &codec,
            &LoginWithExtra {
                token: "1:abc".to_string(),
                admin: true,
            },
        )
        .expect("seal");
        let err = sealed.open::<Login>(&codec).unwrap_err();
        assert!(matches!(err, CodecError::Serialization { .. }));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let sealed = SealedPayload {
            payload: String::new(),
        };
        assert!(sealed.open::<Login>(&codec()).is_err());
    }

    #[test]
    fn wire_shape_is_payload_field() {
        let sealed = SealedPayload {
            payload: "abc".to_string(),
        };
        let json = serde_json::to_value(&sealed).expect("serialize");
        assert_eq!(json, serde_json::json!({ "payload": "abc" }));
    }
}
