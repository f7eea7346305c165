//! One-way fingerprints.

use sha1::{Digest, Sha1};

/// Returns the lowercase hex SHA-1 digest of `data`.
///
/// The digest is deterministic and 40 characters long. It matches the
/// script identity a Redis server computes for `EVALSHA`, which is what the
/// rate limiter relies on. Not suitable for password storage.
#[must_use]
pub fn hash(data: &str) -> String {
    hex::encode(Sha1::digest(data.as_bytes()))
}
