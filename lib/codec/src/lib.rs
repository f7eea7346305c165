//! Credential codec for botdeck.
//!
//! This crate provides:
//!
//! - **Symmetric encryption** of secrets (bot tokens, login payloads, key
//!   material) in two wire formats:
//!   - [`FixedIvCodec`]: process-wide IV, lowercase hex output. Deterministic,
//!     used for values stored at rest.
//!   - [`RandomIvCodec`]: fresh IV per call, `base64(iv):base64(body)` output.
//!     Used for values moving between the web tier and the backend.
//! - **Hashing** ([`hash`]) for fingerprints such as rate-limit script
//!   identities and limiter keys.
//! - **Sealed payloads** ([`SealedPayload`]) carrying JSON documents inside a
//!   single encrypted string.
//!
//! Both codecs share one [`CodecKey`] derived once from the configured secret.
//! Every ciphertext carries an HMAC-SHA256 tag; tampered or foreign input
//! fails closed.
//!
//! # Example
//!
//! ```
//! use botdeck_codec::{CodecKey, CredentialCodec, RandomIvCodec};
//!
//! let key = CodecKey::derive("correct horse battery staple").unwrap();
//! let codec = RandomIvCodec::new(key);
//!
//! let sealed = codec.encrypt("123456:bot-token");
//! assert_eq!(codec.decrypt(&sealed), "123456:bot-token");
//! assert_eq!(codec.decrypt("garbage"), "");
//! ```

pub mod codec;
pub mod error;
pub mod hash;
pub mod key;
pub mod payload;

pub use codec::{CodecVariant, CredentialCodec, FixedIvCodec, RandomIvCodec};
pub use error::CodecError;
pub use hash::hash;
pub use key::CodecKey;
pub use payload::SealedPayload;
