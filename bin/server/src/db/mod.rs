//! Database repositories for the botdeck server.
//!
//! This module provides data access for persisted bot records.

pub mod bots;

pub use bots::{BotRecord, BotRecordStore, BotRepository, BotStatus, RecordError};
