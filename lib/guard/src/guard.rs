//! The request guard pipeline.
//!
//! Checks run cheapest first and stop at the first failure:
//!
//! 1. origin marker
//! 2. closed schema
//! 3. dangerous-key scan
//! 4. key material decryption
//! 5. rate limit on the key material fingerprint

use crate::dangerous::find_dangerous_key_in;
use crate::error::GuardRejection;
use crate::key_material::KeyMaterial;
use crate::schema::RequestSchema;
use botdeck_codec::CredentialCodec;
use botdeck_rate_limit::{RateLimitConfig, RateLimiter};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Static configuration for a [`RequestGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Header that must be present on every guarded request.
    pub origin_header: String,
    /// Body field carrying the sealed key material.
    pub key_field: String,
    /// Limit applied per key material.
    pub rate_limit: RateLimitConfig,
    /// Upper bound on the limiter round trip before failing open.
    pub rate_limit_timeout: Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            origin_header: "x-botdeck-request".to_string(),
            key_field: "hash_key".to_string(),
            rate_limit: RateLimitConfig::default(),
            rate_limit_timeout: Duration::from_millis(500),
        }
    }
}

/// A request body that passed every guard check.
///
/// The key material field has been removed; the rest is the validated field
/// map.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedRequest {
    fields: Map<String, Value>,
    remaining: u32,
}

impl GuardedRequest {
    /// Requests left in the caller's current window.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Deserializes the validated fields into a typed request.
    ///
    /// # Errors
    ///
    /// Returns [`GuardRejection::Validation`] if the fields do not fit `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, GuardRejection> {
        serde_json::from_value(Value::Object(self.fields))
            .map_err(|e| GuardRejection::validation("body", e.to_string()))
    }
}

/// The single choke point for mutating requests.
#[derive(Clone)]
pub struct RequestGuard {
    codec: Arc<dyn CredentialCodec>,
    limiter: RateLimiter,
    policy: GuardPolicy,
}

impl RequestGuard {
    /// Creates a guard that decrypts key material with `codec`.
    #[must_use]
    pub fn new(codec: Arc<dyn CredentialCodec>, limiter: RateLimiter, policy: GuardPolicy) -> Self {
        Self {
            codec,
            limiter,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Runs the full pipeline over one request.
    ///
    /// `origin` is the value of the policy's origin header, if present, and
    /// `body` the raw JSON body.
    ///
    /// # Errors
    ///
    /// Returns the first [`GuardRejection`] encountered.
    pub async fn check(
        &self,
        origin: Option<&str>,
        body: &[u8],
        schema: &RequestSchema,
    ) -> Result<GuardedRequest, GuardRejection> {
        if origin.is_none_or(|value| value.trim().is_empty()) {
            tracing::debug!("guard rejected request without origin marker");
            return Err(GuardRejection::MissingOrigin);
        }

        let mut fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(GuardRejection::validation(
                    "body",
                    "must be a JSON object",
                ));
            }
            Err(_) => return Err(GuardRejection::validation("body", "is not valid JSON")),
        };

        schema.validate(&fields).inspect_err(|e| {
            tracing::debug!(code = e.code(), "guard rejected body shape");
        })?;

        if let Some(path) = find_dangerous_key_in(&fields) {
            tracing::debug!("guard rejected dangerous key");
            return Err(GuardRejection::ForbiddenKey { path });
        }

        let sealed = fields
            .remove(&self.policy.key_field)
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_default();
        let fingerprint = KeyMaterial::recover(self.codec.as_ref(), &sealed)
            .ok_or(GuardRejection::InvalidKeyMaterial)?
            .fingerprint();

        let decision = match tokio::time::timeout(
            self.policy.rate_limit_timeout,
            self.limiter.allow_with(&fingerprint, &self.policy.rate_limit),
        )
        .await
        {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.policy.rate_limit_timeout,
                    "rate limiter timed out, failing open"
                );
                return Ok(GuardedRequest {
                    fields,
                    remaining: self.policy.rate_limit.limit,
                });
            }
        };

        if !decision.allowed {
            return Err(GuardRejection::RateLimited {
                reset_at: decision.reset_at,
            });
        }

        Ok(GuardedRequest {
            fields,
            remaining: decision.remaining,
        })
    }
}

impl std::fmt::Debug for RequestGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGuard")
            .field("codec", &self.codec.variant())
            .field("limiter", &self.limiter)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_material;
    use crate::schema::FieldRule;
    use async_trait::async_trait;
    use botdeck_codec::{CodecKey, FixedIvCodec, RandomIvCodec};
    use botdeck_rate_limit::{KeyValueStore, MemoryStore, StoreError, Ttl};
    use serde::Deserialize;
    use serde_json::json;

    /// A store that never answers.
    struct HangingStore;

    #[async_trait]
    impl KeyValueStore for HangingStore {
        async fn eval_sha(&self, _: &str, _: &[&str], _: &[&str]) -> Result<i64, StoreError> {
            std::future::pending().await
        }

        async fn eval(&self, _: &str, _: &[&str], _: &[&str]) -> Result<i64, StoreError> {
            std::future::pending().await
        }

        async fn ttl(&self, _: &str) -> Result<Ttl, StoreError> {
            std::future::pending().await
        }

        async fn expire(&self, _: &str, _: u64) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    fn codec() -> Arc<dyn CredentialCodec> {
        Arc::new(RandomIvCodec::new(
            CodecKey::derive("guard-secret").expect("derive"),
        ))
    }

    fn guard_with(codec: Arc<dyn CredentialCodec>, store: Arc<dyn KeyValueStore>) -> RequestGuard {
        RequestGuard::new(codec, RateLimiter::new(store), GuardPolicy::default())
    }

    fn guard(codec: Arc<dyn CredentialCodec>) -> RequestGuard {
        guard_with(codec, Arc::new(MemoryStore::new()))
    }

    fn stop_schema() -> RequestSchema {
        RequestSchema::new()
            .field(FieldRule::string("hash_key"))
            .field(FieldRule::integer("bot_id"))
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).expect("serialize")
    }

    #[tokio::test]
    async fn valid_request_passes_without_key_field() {
        let codec = codec();
        let guard = guard(codec.clone());
        let hash_key = key_material::issue(codec.as_ref()).expect("issue");

        let guarded = guard
            .check(
                Some("1"),
                &body(json!({ "hash_key": hash_key, "bot_id": 1001 })),
                &stop_schema(),
            )
            .await
            .expect("guarded");

        assert_eq!(guarded.fields().get("bot_id"), Some(&json!(1001)));
        assert!(guarded.fields().get("hash_key").is_none());
        assert_eq!(guarded.remaining(), 4);
    }

    #[tokio::test]
    async fn missing_origin_is_rejected_first() {
        let guard = guard(codec());
        let err = guard
            .check(None, b"not even json", &stop_schema())
            .await
            .unwrap_err();
        assert_eq!(err, GuardRejection::MissingOrigin);

        let err = guard
            .check(Some("  "), b"{}", &stop_schema())
            .await
            .unwrap_err();
        assert_eq!(err, GuardRejection::MissingOrigin);
    }

    #[tokio::test]
    async fn non_object_body_is_rejected() {
        let guard = guard(codec());
        let err = guard
            .check(Some("1"), b"[1,2]", &stop_schema())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");

        let err = guard
            .check(Some("1"), b"{", &stop_schema())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn unknown_extra_field_is_named() {
        let guard = guard(codec());
        let schema = RequestSchema::new().field(FieldRule::string("hash_key"));
        let err = guard
            .check(
                Some("1"),
                &body(json!({ "hash_key": "anything", "extra": 1 })),
                &schema,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GuardRejection::Validation {
                field: "extra".to_string(),
                message: "unknown field".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn nested_dangerous_keys_are_rejected() {
        let codec = codec();
        let guard = guard(codec.clone());
        let schema = RequestSchema::new()
            .field(FieldRule::string("hash_key"))
            .field(FieldRule::object("filter"));

        let cases = [
            (json!({ "$where": "1" }), "filter.$where"),
            (json!({ "__proto__": {} }), "filter.__proto__"),
            (json!({ "a": { "b.c": 1 } }), "filter.a.b.c"),
            (json!({ "list": [{ "$ne": 1 }] }), "filter.list[0].$ne"),
        ];
        for (filter, expected) in cases {
            let hash_key = key_material::issue(codec.as_ref()).expect("issue");
            let err = guard
                .check(
                    Some("1"),
                    &body(json!({ "hash_key": hash_key, "filter": filter })),
                    &schema,
                )
                .await
                .unwrap_err();
            assert_eq!(
                err,
                GuardRejection::ForbiddenKey {
                    path: expected.to_string()
                }
            );
        }
    }

    #[tokio::test]
    async fn undecryptable_key_material_is_rejected() {
        let codec = codec();
        let guard = guard(codec.clone());

        let foreign = RandomIvCodec::new(CodecKey::derive("other").expect("derive"));
        for hash_key in [
            "garbage".to_string(),
            String::new(),
            key_material::issue(&foreign).expect("issue"),
        ] {
            let err = guard
                .check(
                    Some("1"),
                    &body(json!({ "hash_key": hash_key, "bot_id": 1 })),
                    &stop_schema(),
                )
                .await
                .unwrap_err();
            assert_eq!(err, GuardRejection::InvalidKeyMaterial);
        }
    }

    #[tokio::test]
    async fn key_material_of_other_variant_is_rejected() {
        let key = CodecKey::derive("guard-secret").expect("derive");
        let guard = guard(Arc::new(RandomIvCodec::new(key.clone())));
        let fixed = FixedIvCodec::new(key, "seed");
        let err = guard
            .check(
                Some("1"),
                &body(json!({
                    "hash_key": key_material::issue(&fixed).expect("issue"),
                    "bot_id": 1
                })),
                &stop_schema(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, GuardRejection::InvalidKeyMaterial);
    }

    #[tokio::test]
    async fn sixth_request_with_same_key_is_rate_limited() {
        let codec = codec();
        let guard = guard(codec.clone());
        let hash_key = key_material::issue(codec.as_ref()).expect("issue");
        let request = body(json!({ "hash_key": hash_key, "bot_id": 1 }));

        for _ in 0..5 {
            guard
                .check(Some("1"), &request, &stop_schema())
                .await
                .expect("allowed");
        }
        let err = guard
            .check(Some("1"), &request, &stop_schema())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "rate_limited");

        let fresh = key_material::issue(codec.as_ref()).expect("issue");
        guard
            .check(
                Some("1"),
                &body(json!({ "hash_key": fresh, "bot_id": 1 })),
                &stop_schema(),
            )
            .await
            .expect("fresh key material has its own window");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_limiter_fails_open() {
        let codec = codec();
        let guard = guard_with(codec.clone(), Arc::new(HangingStore));
        let hash_key = key_material::issue(codec.as_ref()).expect("issue");

        let guarded = guard
            .check(
                Some("1"),
                &body(json!({ "hash_key": hash_key, "bot_id": 1 })),
                &stop_schema(),
            )
            .await
            .expect("fails open");
        assert_eq!(guarded.remaining(), 5);
    }

    #[tokio::test]
    async fn guarded_fields_deserialize_into_typed_request() {
        #[derive(Debug, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Stop {
            bot_id: i64,
        }

        let codec = codec();
        let guard = guard(codec.clone());
        let hash_key = key_material::issue(codec.as_ref()).expect("issue");
        let stop: Stop = guard
            .check(
                Some("1"),
                &body(json!({ "hash_key": hash_key, "bot_id": 42 })),
                &stop_schema(),
            )
            .await
            .expect("guarded")
            .into_typed()
            .expect("typed");
        assert_eq!(stop.bot_id, 42);
    }
}
