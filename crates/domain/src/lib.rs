//! Shared domain types for the Courtside assistant engine.

pub mod chat;
pub mod config;
pub mod error;
pub mod game;
pub mod stream;
pub mod trace;
