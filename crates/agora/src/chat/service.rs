//! Message submission and history.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::ws::Hub;

use super::models::{Identity, StoredMessage};
use super::repository::MessageStore;

/// Errors surfaced by the message-submission path.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Empty (or whitespace-only) content, rejected before persistence.
    #[error("message content is required")]
    EmptyContent,

    /// Content over the configured size limit.
    #[error("message content exceeds {0} bytes")]
    ContentTooLong(usize),

    /// The durable store failed; the message was not broadcast.
    #[error("storing message: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Validates, persists, and broadcasts chat messages.
///
/// Persistence always completes before fan-out: a message the store
/// rejected is never offered to any session.
pub struct ChatService {
    store: Arc<dyn MessageStore>,
    hub: Hub,
    max_content_bytes: usize,
}

impl ChatService {
    /// Create a new chat service.
    pub fn new(store: Arc<dyn MessageStore>, hub: Hub, max_content_bytes: usize) -> Self {
        Self {
            store,
            hub,
            max_content_bytes,
        }
    }

    /// Submit a message on behalf of an authenticated identity: validate,
    /// persist, then broadcast to every registered session.
    pub async fn submit(
        &self,
        identity: &Identity,
        content: &str,
    ) -> Result<StoredMessage, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyContent);
        }
        if content.len() > self.max_content_bytes {
            return Err(ChatError::ContentTooLong(self.max_content_bytes));
        }

        let message = self.store.create(identity, content).await?;
        debug!(message = %message.id, user = %identity.user_id, "message persisted");

        self.hub.broadcast(Arc::new(message.clone()));
        Ok(message)
    }

    /// Persisted history, newest first. The durable store is the source
    /// of truth here; the hub's retention buffer is only a catch-up cache
    /// for live sessions.
    pub async fn history(&self) -> Result<Vec<StoredMessage>, ChatError> {
        Ok(self.store.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::{HubConfig, SessionHandle};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    struct FakeStore {
        fail: bool,
        creates: AtomicUsize,
    }

    impl FakeStore {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                creates: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MessageStore for FakeStore {
        async fn create(&self, identity: &Identity, content: &str) -> Result<StoredMessage> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("database unavailable"));
            }
            Ok(StoredMessage {
                id: Uuid::new_v4().to_string(),
                user_id: identity.user_id.clone(),
                username: identity.username.clone(),
                content: content.to_string(),
                created_at: Utc::now(),
            })
        }

        async fn list(&self) -> Result<Vec<StoredMessage>> {
            Ok(Vec::new())
        }

        async fn delete_older_than(&self, _max_age: Duration) -> Result<u64> {
            Ok(0)
        }
    }

    fn identity(user_id: &str, username: &str) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            username: username.to_string(),
        }
    }

    fn spawn_hub() -> Hub {
        let (hub, runner) = crate::ws::Hub::new(HubConfig::default());
        tokio::spawn(runner.run());
        hub
    }

    #[tokio::test]
    async fn test_empty_content_rejected_before_store() {
        let store = FakeStore::new(false);
        let service = ChatService::new(store.clone(), spawn_hub(), 512);

        let err = service.submit(&identity("u1", "alice"), "   ").await;
        assert!(matches!(err, Err(ChatError::EmptyContent)));
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_content_rejected_before_store() {
        let store = FakeStore::new(false);
        let service = ChatService::new(store.clone(), spawn_hub(), 8);

        let err = service.submit(&identity("u1", "alice"), "way too long").await;
        assert!(matches!(err, Err(ChatError::ContentTooLong(8))));
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_means_no_delivery() {
        let hub = spawn_hub();
        let store = FakeStore::new(true);
        let service = ChatService::new(store, hub.clone(), 512);

        let (handle, mut rx) = SessionHandle::new("u1", "alice", 8);
        hub.register(handle).unwrap();
        assert_eq!(hub.session_count().await, 1);

        let err = service.submit(&identity("u1", "alice"), "hi").await;
        assert!(matches!(err, Err(ChatError::Storage(_))));

        // Synchronize on the hub loop, then confirm nothing was enqueued.
        assert_eq!(hub.session_count().await, 1);
        assert!(rx.try_recv().is_err());
        assert!(hub.recent().await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_broadcasts_one_shared_message() {
        let hub = spawn_hub();
        let store = FakeStore::new(false);
        let service = ChatService::new(store, hub.clone(), 512);

        let (handle_a, mut rx_a) = SessionHandle::new("u1", "alice", 8);
        let (handle_b, mut rx_b) = SessionHandle::new("u2", "bob", 8);
        hub.register(handle_a).unwrap();
        hub.register(handle_b).unwrap();
        assert_eq!(hub.session_count().await, 2);

        let stored = service.submit(&identity("u1", "alice"), "hello").await.unwrap();
        assert_eq!(hub.session_count().await, 2);

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a.content, "hello");
        assert_eq!(got_a.id, stored.id);
        // Single shared message, not per-session copies.
        assert_eq!(got_a.id, got_b.id);
        assert!(Arc::ptr_eq(&got_a, &got_b));
    }

    #[tokio::test]
    async fn test_submit_trims_whitespace() {
        let hub = spawn_hub();
        let store = FakeStore::new(false);
        let service = ChatService::new(store, hub.clone(), 512);

        let stored = service.submit(&identity("u1", "alice"), "  hi\n").await.unwrap();
        assert_eq!(stored.content, "hi");
    }
}
