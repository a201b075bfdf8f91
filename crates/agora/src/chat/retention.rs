//! Durable retention sweep.
//!
//! Runs on its own schedule, decoupled from the hub's in-memory expiry:
//! the hub forgets quickly so replay stays small, while the database
//! keeps messages for the configured durable window.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::repository::MessageStore;

/// Periodically delete durable messages older than `max_age`.
pub async fn run_sweeper(store: Arc<dyn MessageStore>, max_age: Duration, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match store.delete_older_than(max_age).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "retention sweep deleted old messages"),
            Err(err) => warn!(error = %err, "retention sweep failed"),
        }
    }
}
