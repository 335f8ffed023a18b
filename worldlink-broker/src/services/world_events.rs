//! Pluggable sink for envelopes a world pushes without a matching
//! `requestId` (i.e. not a reply to any outstanding dispatch).
//!
//! The core correlator hands these off here instead of dropping them
//! silently, so a hosting application can wire up its own fan-out (webhooks,
//! a pub/sub topic, ...) without the broker needing to know about it.

use async_trait::async_trait;
use worldlink_types::Envelope;

/// Dynamic trait object for the world-event sink.
pub type WorldEventSinkService = std::sync::Arc<dyn WorldEventSink + Send + Sync>;

/// Receives envelopes that arrived without a registered waiter.
#[async_trait]
pub trait WorldEventSink {
    /// Called once per unsolicited envelope from `client_id`.
    async fn on_world_event(&self, client_id: &str, envelope: Envelope);
}

/// Default sink: logs the event at debug and otherwise discards it.
pub struct LoggingWorldEventSink;

#[async_trait]
impl WorldEventSink for LoggingWorldEventSink {
    async fn on_world_event(&self, client_id: &str, envelope: Envelope) {
        tracing::debug!(client_id, kind = %envelope.kind, "unsolicited world event dropped (no sink configured)");
    }
}
