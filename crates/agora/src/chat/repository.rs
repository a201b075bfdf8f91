//! Repository for message database operations.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::{Identity, StoredMessage};

/// Durable store for chat messages.
///
/// The service layer only talks to this trait so tests can inject a
/// failing or counting store.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message; assigns `id` and `created_at`.
    async fn create(&self, identity: &Identity, content: &str) -> Result<StoredMessage>;

    /// All persisted messages, newest first.
    async fn list(&self) -> Result<Vec<StoredMessage>>;

    /// Delete durable records older than `max_age`. Returns the number of
    /// rows removed.
    async fn delete_older_than(&self, max_age: Duration) -> Result<u64>;
}

/// SQLite-backed message store.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new message repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get(&self, id: &str) -> Result<StoredMessage> {
        sqlx::query_as::<_, StoredMessage>(
            "SELECT id, user_id, username, content, created_at FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("fetching message")
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn create(&self, identity: &Identity, content: &str) -> Result<StoredMessage> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO messages (id, user_id, username, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&identity.user_id)
        .bind(&identity.username)
        .bind(content)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("inserting message")?;

        self.get(&id).await
    }

    async fn list(&self) -> Result<Vec<StoredMessage>> {
        sqlx::query_as::<_, StoredMessage>(
            r#"
            SELECT id, user_id, username, content, created_at
            FROM messages
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("listing messages")
    }

    async fn delete_older_than(&self, max_age: Duration) -> Result<u64> {
        let max_age = chrono::Duration::from_std(max_age).context("converting retention window")?;
        let cutoff = Utc::now() - max_age;

        let result = sqlx::query("DELETE FROM messages WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("deleting old messages")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn identity() -> Identity {
        Identity {
            user_id: "user-1".to_string(),
            username: "alice".to_string(),
        }
    }

    async fn setup() -> MessageRepository {
        let db = Database::in_memory().await.unwrap();
        MessageRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamp() {
        let repo = setup().await;

        let message = repo.create(&identity(), "Hello, World!").await.unwrap();
        assert!(!message.id.is_empty());
        assert_eq!(message.user_id, "user-1");
        assert_eq!(message.username, "alice");
        assert_eq!(message.content, "Hello, World!");

        let other = repo.create(&identity(), "second").await.unwrap();
        assert_ne!(message.id, other.id);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = setup().await;

        // Insert directly so the timestamps are unambiguous.
        for (id, content, ts) in [
            ("a", "oldest", "2026-01-01T00:00:00+00:00"),
            ("b", "middle", "2026-01-01T00:00:05+00:00"),
            ("c", "newest", "2026-01-01T00:00:10+00:00"),
        ] {
            sqlx::query(
                "INSERT INTO messages (id, user_id, username, content, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind("user-1")
            .bind("alice")
            .bind(content)
            .bind(ts)
            .execute(&repo.pool)
            .await
            .unwrap();
        }

        let messages = repo.list().await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let repo = setup().await;

        let stale = Utc::now() - chrono::Duration::hours(1);
        sqlx::query(
            "INSERT INTO messages (id, user_id, username, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind("stale")
        .bind("user-1")
        .bind("alice")
        .bind("old news")
        .bind(stale)
        .execute(&repo.pool)
        .await
        .unwrap();

        let fresh = repo.create(&identity(), "fresh").await.unwrap();

        let removed = repo
            .delete_older_than(Duration::from_secs(30 * 60))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = repo.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, fresh.id);
    }
}
