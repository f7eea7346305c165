//! Live bot sessions for botdeck.
//!
//! This crate provides:
//!
//! - **Bot platform capabilities** ([`BotConnector`], [`BotClient`]): the
//!   handshake and live-connection operations supplied by the platform
//!   integration.
//! - **Session registry** ([`SessionRegistry`]): the process-wide owner of
//!   live connections, guaranteeing at most one per bot identity.

pub mod client;
pub mod error;
pub mod registry;

pub use client::{BotClient, BotConnector, BotIdentity};
pub use error::{ClientError, SessionError};
pub use registry::SessionRegistry;
