//! Per-connection read/write pumps bridging a WebSocket to the hub.
//!
//! A session owns exactly two concurrent activities: a reader that feeds
//! inbound frames into the message-submission path, and a writer that
//! drains the session's bounded outbound queue. Connection-level failures
//! stay local to the session; they surface to the hub only as an
//! unregister request.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::chat::{ChatService, Identity, StoredMessage};

use super::hub::{Hub, SessionHandle};

/// Timing and sizing knobs for a session's pumps.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the bounded outbound queue.
    pub queue_capacity: usize,
    /// Cadence of ping frames, independent of traffic.
    pub heartbeat_interval: Duration,
    /// Read-idle deadline, refreshed by every received frame.
    pub read_idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            heartbeat_interval: Duration::from_secs(54),
            read_idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Run one authenticated connection until it closes, fails, or is
/// evicted by the hub.
pub async fn run(
    socket: WebSocket,
    identity: Identity,
    hub: Hub,
    chat: Arc<ChatService>,
    config: SessionConfig,
) {
    let (handle, outbound) = SessionHandle::new(
        identity.user_id.clone(),
        identity.username.clone(),
        config.queue_capacity,
    );
    let session_id = handle.id();

    if hub.register(handle).is_err() {
        warn!(user = %identity.user_id, "rejecting connection: hub is closed");
        return;
    }

    let (sink, stream) = socket.split();

    let mut writer = tokio::spawn(write_pump(sink, outbound, config.heartbeat_interval));

    // The writer finishing first means the queue was closed (eviction or
    // hub shutdown) or a write failed; either way the session is over.
    tokio::select! {
        _ = &mut writer => {}
        _ = read_pump(stream, &identity, &chat, config.read_idle_timeout) => {
            // Unregistering closes the outbound queue; the writer drains
            // what is left, writes a close frame, and exits on its own.
            hub.unregister(session_id);
            let _ = writer.await;
        }
    }

    hub.unregister(session_id);
    info!(session = %session_id, user = %identity.user_id, "connection closed");
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<StoredMessage>>,
    heartbeat_interval: Duration,
) {
    let mut ping = tokio::time::interval(heartbeat_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; skip it so pings
    // start one full period after connect.
    ping.tick().await;

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(message) => {
                    let frame = match serde_json::to_string(&*message) {
                        Ok(frame) => frame,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize message frame");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                // Queue closed: the hub unregistered or evicted us.
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    identity: &Identity,
    chat: &ChatService,
    read_idle_timeout: Duration,
) {
    loop {
        let frame = match tokio::time::timeout(read_idle_timeout, stream.next()).await {
            Err(_) => {
                debug!(user = %identity.user_id, "read-idle deadline expired");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!(user = %identity.user_id, error = %err, "websocket read failed");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                // Rejections (empty content, storage failure) stay on this
                // connection; the message is never broadcast.
                if let Err(err) = chat.submit(identity, text.as_str()).await {
                    warn!(user = %identity.user_id, error = %err, "inbound message rejected");
                }
            }
            Message::Binary(_) => {
                debug!(user = %identity.user_id, "ignoring binary frame");
            }
            // Any frame, including heartbeat acks, refreshes the idle
            // deadline. Pings are answered by axum automatically.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }
}
