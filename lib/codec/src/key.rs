//! Process-wide key material and the shared cipher core.

use crate::error::CodecError;
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Length of a CBC initialization vector.
pub const IV_LEN: usize = 16;

/// Length of the HMAC-SHA256 tag appended to every ciphertext.
pub const TAG_LEN: usize = 32;

const BLOCK_LEN: usize = 16;

/// Symmetric key material derived once from the configured secret.
///
/// The first half of a SHA-512 digest of the secret keys AES-256, the second
/// half keys HMAC-SHA256. The key is cheap to clone and is shared read-only by
/// every codec instance.
#[derive(Clone)]
pub struct CodecKey {
    enc: [u8; 32],
    mac: [u8; 32],
}

impl CodecKey {
    /// Derives the key from a secret.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MissingSecret`] if the secret is blank.
    pub fn derive(secret: &str) -> Result<Self, CodecError> {
        if secret.trim().is_empty() {
            return Err(CodecError::MissingSecret);
        }
        let digest = Sha512::digest(secret.as_bytes());
        let mut enc = [0u8; 32];
        let mut mac = [0u8; 32];
        enc.copy_from_slice(&digest[..32]);
        mac.copy_from_slice(&digest[32..]);
        Ok(Self { enc, mac })
    }

    /// Derives a fixed IV from a configured seed.
    #[must_use]
    pub fn derive_iv(seed: &str) -> [u8; IV_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(b"botdeck/fixed-iv\0");
        hasher.update(seed.as_bytes());
        let digest = hasher.finalize();
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&digest[..IV_LEN]);
        iv
    }

    /// Encrypts `plaintext` under `iv` and returns `ciphertext || tag`.
    pub(crate) fn seal(
        &self,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        let mut body = Aes256CbcEnc::new(&self.enc.into(), &(*iv).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let tag = self.mac_for(iv, &body)?.finalize().into_bytes();
        body.extend_from_slice(&tag);
        Ok(body)
    }

    /// Verifies and decrypts `ciphertext || tag` produced by [`Self::seal`].
    pub(crate) fn open(&self, iv: &[u8; IV_LEN], body: &[u8]) -> Result<Vec<u8>, CodecError> {
        if body.len() < BLOCK_LEN + TAG_LEN || (body.len() - TAG_LEN) % BLOCK_LEN != 0 {
            return Err(CodecError::Malformed {
                reason: format!("unexpected body length {}", body.len()),
            });
        }
        let (ciphertext, tag) = body.split_at(body.len() - TAG_LEN);

        self.mac_for(iv, ciphertext)?
            .verify_slice(tag)
            .map_err(|_| CodecError::IntegrityCheckFailed)?;

        Aes256CbcDec::new(&self.enc.into(), &(*iv).into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| CodecError::DecryptionFailed {
                reason: e.to_string(),
            })
    }

    fn mac_for(&self, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<HmacSha256, CodecError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.mac).map_err(|e| {
            CodecError::Malformed {
                reason: e.to_string(),
            }
        })?;
        mac.update(iv);
        mac.update(ciphertext);
        Ok(mac)
    }
}

impl fmt::Debug for CodecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodecKey(<redacted>)")
    }
}
