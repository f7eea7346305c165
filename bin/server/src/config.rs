//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! `__` as separator, e.g. `CODEC__SECRET` or `GUARD__LIMIT`.

use botdeck_guard::GuardPolicy;
use botdeck_rate_limit::RateLimitConfig;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Redis URL for the shared rate-limit store.
    /// When absent, an in-process store is used.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Identity recorded on bot records owned by this process.
    #[serde(default = "default_worker_id")]
    pub worker_id: String,

    /// Credential codec configuration.
    pub codec: CodecConfig,

    /// Request guard configuration.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Bot platform configuration.
    #[serde(default)]
    pub bots: BotsConfig,
}

/// Credential codec configuration.
#[derive(Clone, Deserialize)]
pub struct CodecConfig {
    /// Secret the codec key is derived from. Required.
    pub secret: String,

    /// Seed for the fixed IV used at rest. Defaults to the secret.
    #[serde(default)]
    pub fixed_iv_seed: Option<String>,
}

impl CodecConfig {
    /// The seed for the fixed-IV codec.
    #[must_use]
    pub fn iv_seed(&self) -> &str {
        self.fixed_iv_seed.as_deref().unwrap_or(&self.secret)
    }
}

impl std::fmt::Debug for CodecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecConfig")
            .field("secret", &"<redacted>")
            .field("fixed_iv_seed", &self.fixed_iv_seed.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Request guard configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Header every mutating request must carry.
    #[serde(default = "default_origin_header")]
    pub origin_header: String,

    /// Requests allowed per key material per window.
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Rate limit window, in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Budget for the rate limiter round trip before failing open.
    #[serde(default = "default_rate_limit_timeout_ms")]
    pub rate_limit_timeout_ms: u64,

    /// Namespace for rate limiter keys in the shared store.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl GuardConfig {
    /// Builds the guard policy.
    #[must_use]
    pub fn policy(&self) -> GuardPolicy {
        GuardPolicy {
            origin_header: self.origin_header.clone(),
            rate_limit: RateLimitConfig::new(self.limit, self.window_seconds),
            rate_limit_timeout: Duration::from_millis(self.rate_limit_timeout_ms),
            ..GuardPolicy::default()
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            origin_header: default_origin_header(),
            limit: default_limit(),
            window_seconds: default_window_seconds(),
            rate_limit_timeout_ms: default_rate_limit_timeout_ms(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Bot platform configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotsConfig {
    /// Upper bound on a bot handshake, in seconds.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    /// Base URL of the Telegram Bot API.
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    /// Long-poll timeout for update polling, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl BotsConfig {
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for BotsConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout_secs(),
            telegram_api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_worker_id() -> String {
    "worker-1".to_string()
}

fn default_origin_header() -> String {
    "x-botdeck-request".to_string()
}

fn default_limit() -> u32 {
    5
}

fn default_window_seconds() -> u64 {
    120
}

fn default_rate_limit_timeout_ms() -> u64 {
    500
}

fn default_key_prefix() -> String {
    "botdeck:rl".to_string()
}

fn default_handshake_timeout_secs() -> u64 {
    15
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
