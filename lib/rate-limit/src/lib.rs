//! Distributed rate limiting for botdeck.
//!
//! This crate provides:
//!
//! - **Key-value store capability** ([`KeyValueStore`]): the narrow set of
//!   operations the limiter needs from a shared store, injected explicitly.
//! - **Redis store** ([`RedisStore`]): the production store.
//! - **In-process store** ([`MemoryStore`]): a single-node stand-in that
//!   understands the fixed-window counter script.
//! - **Rate limiter** ([`RateLimiter`]): an atomic fixed-window counter that
//!   fails open when the store is unreachable.

pub mod error;
pub mod limiter;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::StoreError;
pub use limiter::{FIXED_WINDOW_SCRIPT, RateLimitConfig, RateLimitDecision, RateLimiter};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{KeyValueStore, Ttl};
