//! Core data models for the housing-rental marketplace.
//!
//! These entities map to SQLite tables via `sqlx::FromRow` and serialize as
//! camelCase JSON via `serde`, which is the shape the web client consumes.

pub mod booking;
pub mod chat;
pub mod property;
pub mod review;
pub mod user;
