//! Hearth - session authentication core
//!
//! Opaque session tokens, hashed at rest, validated against persisted sessions
//! with sliding expiry.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
