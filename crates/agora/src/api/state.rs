//! Shared application state.

use std::sync::Arc;

use crate::auth::AuthState;
use crate::chat::ChatService;
use crate::ws::{Hub, SessionConfig};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Chat service (validation, persistence, broadcast).
    pub chat: Arc<ChatService>,

    /// Broadcast hub handle.
    pub hub: Hub,

    /// Authentication state.
    pub auth: AuthState,

    /// Per-connection WebSocket settings.
    pub session_config: SessionConfig,
}

impl AppState {
    pub fn new(
        chat: Arc<ChatService>,
        hub: Hub,
        auth: AuthState,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            chat,
            hub,
            auth,
            session_config,
        }
    }
}
