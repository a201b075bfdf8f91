//! Real-time fan-out: broadcast hub plus per-connection sessions.
//!
//! The hub loop is the single owner of "who is connected" and "what was
//! recently said"; sessions bridge one WebSocket each to that loop
//! through a bounded outbound queue.

mod hub;
pub mod session;

pub use hub::{Hub, HubClosed, HubConfig, HubRunner, SessionHandle, SessionId};
pub use session::SessionConfig;
