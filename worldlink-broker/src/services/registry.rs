//! Process-wide bookkeeping of all currently connected worlds.
//!
//! Generalizes the teacher's `HashSet<Uuid>` open-session guard into a keyed
//! map from `clientId` to the live [`Session`], plus a `clientId -> in-flight
//! requestId` index so a session's close path can fail its own waiters
//! immediately instead of waiting for them to time out (see the "no
//! back-pointers" design note).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::metrics::{METRICS_ID_SESSIONS_OPEN, METRICS_ID_SESSIONS_SUPERSEDED, METRICS_ID_SESSIONS_SWEPT};
use crate::session::Session;

/// Keeps track of every currently registered world session.
#[derive(Default)]
pub struct Registry {
    sessions: DashMap<String, Arc<Session>>,
    in_flight: DashMap<String, HashSet<Uuid>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session` under `client_id`, returning the previous session
    /// for that id if one existed (the caller is responsible for closing it
    /// and failing its in-flight waiters).
    pub fn add(&self, client_id: String, session: Arc<Session>) -> Option<Arc<Session>> {
        let previous = self.sessions.insert(client_id.clone(), session);
        if previous.is_some() {
            metrics::counter!(METRICS_ID_SESSIONS_SUPERSEDED).increment(1);
        } else {
            metrics::gauge!(METRICS_ID_SESSIONS_OPEN).increment(1.0);
        }
        previous
    }

    /// Removes `client_id` only if the currently registered session is the
    /// same instance as `session` (so a superseded session's delayed close
    /// cannot remove its successor). Idempotent.
    pub fn remove(&self, client_id: &str, session: &Arc<Session>) {
        let removed = self
            .sessions
            .remove_if(client_id, |_, current| Arc::ptr_eq(current, session));
        if removed.is_some() {
            metrics::gauge!(METRICS_ID_SESSIONS_OPEN).decrement(1.0);
        }
    }

    /// Looks up the currently live session for `client_id`.
    pub fn get(&self, client_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(client_id).map(|entry| Arc::clone(&entry))
    }

    /// Closes and removes every session whose last activity predates
    /// `now - threshold`. Returns the evicted sessions so the caller can run
    /// their close path (send a close frame, fail in-flight waiters).
    pub fn sweep_inactive(&self, now: Instant, threshold: Duration) -> Vec<Arc<Session>> {
        let mut evicted = Vec::new();
        self.sessions.retain(|_, session| {
            let stale = now.saturating_duration_since(session.last_seen()) > threshold;
            if stale {
                evicted.push(Arc::clone(session));
            }
            !stale
        });
        if !evicted.is_empty() {
            metrics::gauge!(METRICS_ID_SESSIONS_OPEN).decrement(evicted.len() as f64);
            metrics::counter!(METRICS_ID_SESSIONS_SWEPT).increment(evicted.len() as u64);
        }
        evicted
    }

    /// Records that `request_id` is currently in flight against `client_id`.
    pub fn track_request(&self, client_id: &str, request_id: Uuid) {
        self.in_flight
            .entry(client_id.to_owned())
            .or_default()
            .insert(request_id);
    }

    /// Marks `request_id` as resolved (reply, timeout or cancellation).
    pub fn untrack_request(&self, client_id: &str, request_id: &Uuid) {
        if let Some(mut ids) = self.in_flight.get_mut(client_id) {
            ids.remove(request_id);
        }
    }

    /// Drains and returns every request id still in flight for `client_id`,
    /// for use by the close path to fail them immediately.
    pub fn take_in_flight(&self, client_id: &str) -> Vec<Uuid> {
        self.in_flight
            .remove(client_id)
            .map(|(_, ids)| ids.into_iter().collect())
            .unwrap_or_default()
    }

    /// Removes and returns every currently registered session, for use by
    /// the shutdown teardown path. Leaves the registry empty.
    pub fn drain_all(&self) -> Vec<Arc<Session>> {
        let drained: Vec<Arc<Session>> = self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect();
        self.sessions.clear();
        if !drained.is_empty() {
            metrics::gauge!(METRICS_ID_SESSIONS_OPEN).decrement(drained.len() as f64);
        }
        drained
    }

    /// Number of currently registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry has no registered sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_has_no_sessions() {
        let registry = Registry::new();
        assert!(registry.get("w1").is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn in_flight_tracking_round_trips() {
        let registry = Registry::new();
        let rid = Uuid::new_v4();
        registry.track_request("w1", rid);
        assert_eq!(registry.take_in_flight("w1"), vec![rid]);
        assert!(registry.take_in_flight("w1").is_empty());
    }

    #[test]
    fn drain_all_empties_the_registry() {
        let registry = Registry::new();
        let rid = Uuid::new_v4();
        registry.track_request("w1", rid);
        assert_eq!(registry.len(), 0);
        assert!(registry.drain_all().is_empty());
        assert_eq!(registry.take_in_flight("w1"), vec![rid]);
    }

    #[test]
    fn untrack_removes_single_id() {
        let registry = Registry::new();
        let rid1 = Uuid::new_v4();
        let rid2 = Uuid::new_v4();
        registry.track_request("w1", rid1);
        registry.track_request("w1", rid2);
        registry.untrack_request("w1", &rid1);
        let remaining = registry.take_in_flight("w1");
        assert_eq!(remaining, vec![rid2]);
    }
}
