//! Broadcast hub: the single owner of the session registry and the
//! in-memory retention buffer.
//!
//! All mutation goes through one event loop ([`HubRunner::run`]). The
//! [`Hub`] handle only submits requests; nothing outside the loop ever
//! touches the registry or the buffer, so there is no locking and no
//! lost-update race between concurrent register/unregister/broadcast
//! calls. Fan-out uses non-blocking sends into bounded per-session
//! queues: a consumer that cannot keep up is evicted instead of stalling
//! everyone else.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chat::StoredMessage;

/// Unique identifier for a registered session.
pub type SessionId = Uuid;

/// Error returned when registering against a hub whose loop has stopped.
#[derive(Debug, Error)]
#[error("hub is closed")]
pub struct HubClosed;

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum age a message may reach in the retention buffer.
    pub message_ttl: Duration,
    /// Cadence of retention-buffer cleanup passes.
    pub cleanup_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            message_ttl: Duration::from_secs(20),
            cleanup_interval: Duration::from_secs(5),
        }
    }
}

/// Hub-side view of one connected session: its identity, fixed at
/// connection-upgrade time, and the sending half of its bounded
/// outbound queue.
pub struct SessionHandle {
    id: SessionId,
    user_id: String,
    username: String,
    tx: mpsc::Sender<Arc<StoredMessage>>,
}

impl SessionHandle {
    /// Create a handle together with the receiving half of its outbound
    /// queue. The receiver belongs to the session's writer; the handle is
    /// given to the hub via [`Hub::register`].
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Arc<StoredMessage>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            username: username.into(),
            tx,
        };
        (handle, rx)
    }

    /// Identifier used to unregister this session later.
    pub fn id(&self) -> SessionId {
        self.id
    }
}

enum HubCommand {
    Register(SessionHandle),
    Unregister(SessionId),
    Broadcast(Arc<StoredMessage>),
    SessionCount(oneshot::Sender<usize>),
    Recent(oneshot::Sender<Vec<Arc<StoredMessage>>>),
}

/// Cloneable handle for submitting requests to the hub loop.
#[derive(Clone)]
pub struct Hub {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl Hub {
    /// Create a hub handle and the runner that owns all hub state. The
    /// runner must be driven exactly once, typically via
    /// `tokio::spawn(runner.run())`.
    pub fn new(config: HubConfig) -> (Self, HubRunner) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = HubRunner {
            rx,
            config,
            sessions: HashMap::new(),
            retained: VecDeque::new(),
        };
        (Self { tx }, runner)
    }

    /// Add a session to the registry. The hub replays the current
    /// retention-buffer contents into the session's queue (best effort,
    /// same backpressure policy as broadcast) so late joiners catch up.
    pub fn register(&self, handle: SessionHandle) -> Result<(), HubClosed> {
        self.tx
            .send(HubCommand::Register(handle))
            .map_err(|_| HubClosed)
    }

    /// Remove a session from the registry and close its outbound queue.
    /// Idempotent: unknown or already-removed sessions are a no-op.
    pub fn unregister(&self, id: SessionId) {
        let _ = self.tx.send(HubCommand::Unregister(id));
    }

    /// Fan a message out to every registered session, in submission
    /// order. Never an error for the caller; sessions whose queues are
    /// full are evicted as a side effect.
    pub fn broadcast(&self, message: Arc<StoredMessage>) {
        if self.tx.send(HubCommand::Broadcast(message)).is_err() {
            warn!("dropping broadcast: hub loop has stopped");
        }
    }

    /// Number of currently registered sessions.
    pub async fn session_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HubCommand::SessionCount(reply)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Snapshot of the retention buffer, oldest first.
    pub async fn recent(&self) -> Vec<Arc<StoredMessage>> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HubCommand::Recent(reply)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

/// Owns the registry and the retention buffer. [`HubRunner::run`] is the
/// only code path that mutates either.
pub struct HubRunner {
    rx: mpsc::UnboundedReceiver<HubCommand>,
    config: HubConfig,
    sessions: HashMap<SessionId, SessionHandle>,
    // Retained messages in creation order, stamped with the instant the
    // hub accepted them so expiry follows the runtime clock.
    retained: VecDeque<(Instant, Arc<StoredMessage>)>,
}

impl HubRunner {
    /// Drive the hub until every [`Hub`] handle has been dropped.
    pub async fn run(mut self) {
        let mut cleanup = tokio::time::interval(self.config.cleanup_interval);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately.
        cleanup.tick().await;

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                _ = cleanup.tick() => self.expire_retained(),
            }
        }

        debug!("hub loop stopped");
    }

    fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register(handle) => self.register(handle),
            HubCommand::Unregister(id) => self.unregister(id),
            HubCommand::Broadcast(message) => self.broadcast(message),
            HubCommand::SessionCount(reply) => {
                let _ = reply.send(self.sessions.len());
            }
            HubCommand::Recent(reply) => {
                let snapshot = self.retained.iter().map(|(_, m)| m.clone()).collect();
                let _ = reply.send(snapshot);
            }
        }
    }

    fn register(&mut self, handle: SessionHandle) {
        // Catch-up replay. A session that cannot even absorb the retained
        // history is treated like any other slow consumer: its queue is
        // closed (by dropping the handle) and it never joins the registry.
        for (_, message) in &self.retained {
            if handle.tx.try_send(message.clone()).is_err() {
                warn!(
                    session = %handle.id,
                    user = %handle.user_id,
                    "session evicted during history replay"
                );
                return;
            }
        }

        debug!(
            session = %handle.id,
            user = %handle.user_id,
            username = %handle.username,
            "session registered"
        );
        self.sessions.insert(handle.id, handle);
    }

    fn unregister(&mut self, id: SessionId) {
        if let Some(handle) = self.sessions.remove(&id) {
            debug!(session = %id, user = %handle.user_id, "session unregistered");
        }
    }

    fn broadcast(&mut self, message: Arc<StoredMessage>) {
        self.retained.push_back((Instant::now(), message.clone()));

        let mut evicted = Vec::new();
        for (id, handle) in &self.sessions {
            match handle.tx.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        session = %id,
                        user = %handle.user_id,
                        "outbound queue full, evicting slow session"
                    );
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    evicted.push(*id);
                }
            }
        }

        for id in evicted {
            self.sessions.remove(&id);
        }
    }

    fn expire_retained(&mut self) {
        let now = Instant::now();
        let before = self.retained.len();
        self.retained
            .retain(|(accepted, _)| now.duration_since(*accepted) <= self.config.message_ttl);
        let removed = before - self.retained.len();
        if removed > 0 {
            debug!(removed, remaining = self.retained.len(), "expired retained messages");
        }
    }
}
