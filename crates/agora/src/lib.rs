//! Agora chat backend library.
//!
//! The core of the service is a broadcast hub (`ws::hub`) that owns the
//! registry of connected WebSocket sessions and a short-lived in-memory
//! buffer of recent messages. The REST handlers, JWT validation, and
//! SQLite persistence all feed into or out of that hub.

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod ws;
