//! Core domain types and utilities for the botdeck control panel.
//!
//! This crate provides the identifiers, secret wrappers and error handling
//! shared by the session registry, the request guard and the server.

pub mod error;
pub mod id;
pub mod token;

pub use error::Result;
pub use id::{BotId, ParseIdError, UserId, WorkerId};
pub use token::BotToken;
