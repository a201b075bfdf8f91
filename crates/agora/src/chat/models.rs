//! Chat data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A chat message as persisted and fanned out to clients.
///
/// Created exactly once by the message store, which assigns `id` and
/// `created_at`; immutable afterwards. The hub holds `Arc` copies in its
/// retention buffer, so one stored row is one shared message no matter
/// how many sessions it reaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StoredMessage {
    /// Store-assigned unique identifier.
    pub id: String,
    /// Author's user ID.
    pub user_id: String,
    /// Author's username at send time.
    pub username: String,
    /// Message body.
    pub content: String,
    /// Store-assigned creation time.
    pub created_at: DateTime<Utc>,
}

/// Authenticated identity attached to a connection or request, populated
/// exactly once at upgrade/validation time.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}
