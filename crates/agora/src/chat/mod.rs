//! Chat domain: message model, durable store, and the submission path
//! that ties validation, persistence, and hub fan-out together.

mod models;
mod repository;
pub mod retention;
mod service;

pub use models::{Identity, StoredMessage};
pub use repository::{MessageRepository, MessageStore};
pub use service::{ChatError, ChatService};
