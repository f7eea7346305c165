//! Request guard for botdeck.
//!
//! Every mutating request passes through [`RequestGuard::check`] before it
//! may touch the session registry or persisted data. The guard:
//!
//! - requires an origin marker header,
//! - validates the body against a closed [`RequestSchema`],
//! - rejects denylisted, sigil-prefixed and path-like keys at any depth,
//! - decrypts the caller's key material ([`KeyMaterial`]),
//! - applies a per-key-material rate limit that fails open.
//!
//! Failures are typed [`GuardRejection`]s with stable codes.

pub mod dangerous;
pub mod error;
pub mod guard;
pub mod key_material;
pub mod schema;

pub use error::GuardRejection;
pub use guard::{GuardPolicy, GuardedRequest, RequestGuard};
pub use key_material::KeyMaterial;
pub use schema::{FieldKind, FieldRule, RequestSchema};
