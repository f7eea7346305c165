//! Short-lived key material identifying a caller for rate limiting.
//!
//! The web tier fetches a freshly issued `hash_key` per page load and sends it
//! back with every mutating request. The guard decrypts it once and uses its
//! fingerprint as the limiter identity; the plaintext never leaves the
//! request.

use botdeck_codec::{CodecError, CredentialCodec};
use rand::Rng;
use std::fmt;

const RAW_LEN: usize = 24;

/// Decrypted key material.
pub struct KeyMaterial(String);

impl KeyMaterial {
    /// Decrypts `sealed`, returning `None` when nothing could be recovered.
    #[must_use]
    pub fn recover(codec: &dyn CredentialCodec, sealed: &str) -> Option<Self> {
        let plaintext = codec.decrypt(sealed);
        if plaintext.trim().is_empty() {
            None
        } else {
            Some(Self(plaintext))
        }
    }

    /// One-way fingerprint used as the rate-limit identity.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        botdeck_codec::hash(&self.0)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// Issues fresh key material sealed with `codec`.
///
/// # Errors
///
/// Returns an error if the codec cannot seal the value.
pub fn issue(codec: &dyn CredentialCodec) -> Result<String, CodecError> {
    let mut raw = [0u8; RAW_LEN];
    rand::rng().fill(&mut raw);
    codec.seal(hex::encode(raw).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use botdeck_codec::{CodecKey, RandomIvCodec};

    fn codec() -> RandomIvCodec {
        RandomIvCodec::new(CodecKey::derive("guard-secret").expect("derive"))
    }

    #[test]
    fn issued_material_is_recoverable() {
        let codec = codec();
        let sealed = issue(&codec).expect("issue");
        let material = KeyMaterial::recover(&codec, &sealed).expect("recover");
        assert_eq!(material.fingerprint().len(), 40);
    }

    #[test]
    fn each_issue_is_distinct() {
        let codec = codec();
        let a = KeyMaterial::recover(&codec, &issue(&codec).expect("issue")).expect("a");
        let b = KeyMaterial::recover(&codec, &issue(&codec).expect("issue")).expect("b");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn garbage_is_not_recovered() {
        assert!(KeyMaterial::recover(&codec(), "garbage").is_none());
        assert!(KeyMaterial::recover(&codec(), "").is_none());
    }

    #[test]
    fn debug_is_redacted() {
        let material = KeyMaterial("secret".to_string());
        assert_eq!(format!("{material:?}"), "KeyMaterial(<redacted>)");
    }
}
