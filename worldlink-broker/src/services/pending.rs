//! The pending-request table: `requestId -> waiter`, used by the dispatcher
//! to turn a synchronous HTTP call into an awaited reply to an asynchronous
//! WebSocket exchange.
//!
//! Generalizes the teacher's nonce-confirmation store (a `oneshot`-keyed map
//! with a spawned deadline task that drops stale entries) from a single
//! fire-and-forget confirmation signal to a full reply payload.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;
use worldlink_types::Envelope;

use crate::metrics::METRICS_ID_PENDING_UNMATCHED;

/// Why a waiter resolved without a world-provided payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No reply arrived before the deadline.
    Timeout,
    /// The session the request was routed to was lost.
    SessionLost,
    /// The HTTP caller disconnected before a reply arrived.
    Cancelled,
}

/// The result a waiter resolves to.
pub enum WaitResult {
    /// The world replied (successfully or with an `error` field set).
    Reply(Envelope),
    /// The request did not resolve with a reply.
    Failed(Outcome),
}

/// A registered, not-yet-resolved request.
pub struct Waiter {
    request_id: Uuid,
    receiver: oneshot::Receiver<WaitResult>,
}

impl Waiter {
    /// The `requestId` this waiter was registered under.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Blocks until the waiter resolves. If the sender was dropped without
    /// sending (a bug, not a designed path) this resolves as `SessionLost`.
    pub async fn await_result(self) -> WaitResult {
        self.receiver
            .await
            .unwrap_or(WaitResult::Failed(Outcome::SessionLost))
    }
}

/// Concurrent `requestId -> waiter` map with deadline-driven expiry.
#[derive(Default)]
pub struct PendingTable {
    store: DashMap<Uuid, oneshot::Sender<WaitResult>>,
}

impl PendingTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh waiter for `request_id` and spawns a background
    /// task that fails it with [`Outcome::Timeout`] if nothing else resolves
    /// it within `deadline`.
    pub fn register(self: &Arc<Self>, request_id: Uuid, deadline: Duration) -> Waiter {
        let (tx, rx) = oneshot::channel();
        self.store.insert(request_id, tx);

        tokio::task::spawn({
            let table = Arc::clone(self);
            async move {
                tokio::time::sleep(deadline).await;
                table.fail(request_id, Outcome::Timeout);
            }
        });

        Waiter {
            request_id,
            receiver: rx,
        }
    }

    /// Delivers `envelope` to the waiter registered under `request_id`, if
    /// any. A missing waiter (late reply, duplicate, unknown id) is a no-op,
    /// logged at warn and counted.
    pub fn complete(&self, request_id: Uuid, envelope: Envelope) {
        match self.store.remove(&request_id) {
            Some((_, sender)) => {
                let _ = sender.send(WaitResult::Reply(envelope));
            }
            None => {
                metrics::counter!(METRICS_ID_PENDING_UNMATCHED).increment(1);
                tracing::warn!(%request_id, "reply for unknown or already-resolved request");
            }
        }
    }

    /// Fails the waiter for `request_id` with `outcome`, if it is still
    /// registered. Idempotent: a second call is a no-op.
    pub fn fail(&self, request_id: Uuid, outcome: Outcome) {
        if let Some((_, sender)) = self.store.remove(&request_id) {
            let _ = sender.send(WaitResult::Failed(outcome));
        }
    }

    /// Fails every id in `request_ids` with `outcome`. Used by the session
    /// close path to resolve its own in-flight requests immediately instead
    /// of letting them run out the clock.
    pub fn fail_all(&self, request_ids: &[Uuid], outcome: Outcome) {
        for request_id in request_ids {
            self.fail(*request_id, outcome);
        }
    }

    /// Fails every waiter still registered with `outcome`, regardless of
    /// which request it belongs to. Used by the shutdown teardown path to
    /// unblock every HTTP handler still awaiting a world reply.
    pub fn fail_all_remaining(&self, outcome: Outcome) {
        let request_ids: Vec<Uuid> = self.store.iter().map(|entry| *entry.key()).collect();
        self.fail_all(&request_ids, outcome);
    }

    /// Number of waiters currently registered.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no waiters are currently registered.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn envelope(request_id: Uuid) -> Envelope {
        Envelope {
            kind: "entity-result".to_owned(),
            request_id: Some(request_id),
            client_id: None,
            payload: Map::new(),
            error: None,
        }
    }

    #[tokio::test]
    async fn complete_resolves_matching_waiter() {
        let table = Arc::new(PendingTable::new());
        let request_id = Uuid::new_v4();
        let waiter = table.register(request_id, Duration::from_secs(30));
        table.complete(request_id, envelope(request_id));
        match waiter.await_result().await {
            WaitResult::Reply(env) => assert_eq!(env.request_id, Some(request_id)),
            WaitResult::Failed(_) => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn complete_for_unknown_id_is_a_noop() {
        let table = Arc::new(PendingTable::new());
        let request_id = Uuid::new_v4();
        table.complete(request_id, envelope(request_id));
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_waiter_times_out() {
        let table = Arc::new(PendingTable::new());
        let request_id = Uuid::new_v4();
        let waiter = table.register(request_id, Duration::from_millis(50));
        tokio::time::advance(Duration::from_millis(100)).await;
        match waiter.await_result().await {
            WaitResult::Failed(Outcome::Timeout) => {}
            _ => panic!("expected a timeout"),
        }
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn fail_all_remaining_drains_every_waiter() {
        let table = Arc::new(PendingTable::new());
        let rid1 = Uuid::new_v4();
        let rid2 = Uuid::new_v4();
        let w1 = table.register(rid1, Duration::from_secs(30));
        let w2 = table.register(rid2, Duration::from_secs(30));
        table.fail_all_remaining(Outcome::Cancelled);
        assert!(table.is_empty());
        assert!(matches!(w1.await_result().await, WaitResult::Failed(Outcome::Cancelled)));
        assert!(matches!(w2.await_result().await, WaitResult::Failed(Outcome::Cancelled)));
    }

    #[tokio::test]
    async fn fail_all_drains_listed_ids() {
        let table = Arc::new(PendingTable::new());
        let rid1 = Uuid::new_v4();
        let rid2 = Uuid::new_v4();
        let w1 = table.register(rid1, Duration::from_secs(30));
        let w2 = table.register(rid2, Duration::from_secs(30));
        table.fail_all(&[rid1, rid2], Outcome::SessionLost);
        assert!(matches!(
            w1.await_result().await,
            WaitResult::Failed(Outcome::SessionLost)
        ));
        assert!(matches!(
            w2.await_result().await,
            WaitResult::Failed(Outcome::SessionLost)
        ));
    }
}
