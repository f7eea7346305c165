//! Shared application state.

use crate::config::ServerConfig;
use crate::db::BotRecordStore;
use crate::error::StartupError;
use crate::service::BotService;
use botdeck_codec::{CodecKey, CredentialCodec, FixedIvCodec, RandomIvCodec};
use botdeck_core::WorkerId;
use botdeck_guard::RequestGuard;
use botdeck_rate_limit::{KeyValueStore, MemoryStore, RateLimiter, RedisStore};
use botdeck_session::{BotConnector, SessionRegistry};
use std::sync::Arc;

/// State shared by every request handler.
pub struct AppState {
    pub service: BotService,
    pub guard: RequestGuard,
    /// Random-IV codec for values exchanged with the web tier.
    pub wire_codec: Arc<dyn CredentialCodec>,
}

/// Wires codecs, the rate limit store, the guard and the bot service.
///
/// # Errors
///
/// Returns an error if the codec secret is blank or the Redis URL is invalid.
pub fn build_state(
    config: &ServerConfig,
    records: Arc<dyn BotRecordStore>,
    connector: Arc<dyn BotConnector>,
) -> botdeck_core::Result<AppState, StartupError> {
    let key = CodecKey::derive(&config.codec.secret).map_err(|e| StartupError::InvalidSecret {
        details: e.to_string(),
    })?;
    let storage_codec: Arc<dyn CredentialCodec> =
        Arc::new(FixedIvCodec::new(key.clone(), config.codec.iv_seed()));
    let wire_codec: Arc<dyn CredentialCodec> = Arc::new(RandomIvCodec::new(key));

    let store: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::new(url).map_err(|e| StartupError::Store {
            details: e.to_string(),
        })?),
        None => {
            tracing::warn!("no redis_url configured, rate limits are local to this process");
            Arc::new(MemoryStore::new())
        }
    };
    let limiter = RateLimiter::new(store).with_key_prefix(config.guard.key_prefix.clone());
    let guard = RequestGuard::new(Arc::clone(&wire_codec), limiter, config.guard.policy());

    let service = BotService::new(
        Arc::new(SessionRegistry::new(connector)),
        records,
        storage_codec,
        WorkerId::new(config.worker_id.clone()),
        config.bots.handshake_timeout(),
    );

    Ok(AppState {
        service,
        guard,
        wire_codec,
    })
}
