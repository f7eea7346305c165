//! botdeck HTTP control plane.
//!
//! This crate wires the codec, request guard, rate limiter and session
//! registry into an axum server, persists bot records in Postgres and
//! connects bots to Telegram.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod service;
pub mod state;
pub mod telegram;

#[cfg(test)]
pub(crate) mod testing;
