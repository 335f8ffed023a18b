//! Inactivity sweep background task.
//!
//! On a fixed cadence, evicts every session whose `lastSeen` predates the
//! configured idle threshold, closes it, and fails its own in-flight
//! requests immediately rather than leaving them to time out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{close_code, CloseFrame};
use tokio_util::sync::CancellationToken;

use crate::services::pending::{Outcome, PendingTable};
use crate::services::registry::Registry;

/// Arguments for [`inactivity_sweep_task`].
pub struct InactivitySweepTaskArgs {
    /// How often the sweep runs.
    pub interval: Duration,
    /// How long a session may go without activity before eviction.
    pub idle_threshold: Duration,
    /// The registry swept for idle sessions.
    pub registry: Arc<Registry>,
    /// The pending table whose waiters get failed for evicted sessions.
    pub pending: Arc<PendingTable>,
    /// Cancelled to stop the task during graceful shutdown.
    pub cancellation_token: CancellationToken,
}

/// Background task that periodically evicts idle sessions.
pub async fn inactivity_sweep_task(args: InactivitySweepTaskArgs) {
    let InactivitySweepTaskArgs {
        interval,
        idle_threshold,
        registry,
        pending,
        cancellation_token,
    } = args;

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancellation_token.cancelled() => {
                tracing::info!("inactivity sweep task shutting down");
                return;
            }
        }

        let evicted = registry.sweep_inactive(Instant::now(), idle_threshold);
        if evicted.is_empty() {
            continue;
        }
        tracing::info!(count = evicted.len(), "evicting idle sessions");
        for session in evicted {
            let in_flight = registry.take_in_flight(session.client_id());
            pending.fail_all(&in_flight, Outcome::SessionLost);
            session
                .close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: "inactivity timeout".into(),
                }))
                .await;
        }
    }
}
