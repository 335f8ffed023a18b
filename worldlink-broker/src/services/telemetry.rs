//! Pluggable sink for the broker's own structured telemetry.
//!
//! Distinct from the broker's own `tracing` spans: this is the audit-style
//! channel a hosting application wires up to its own log/metrics pipeline,
//! mirroring how [`super::world_events::WorldEventSink`] hands off events the
//! broker itself has no opinion about consuming.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::metrics::METRICS_ID_LOGS_TOTAL;

/// Structured metadata accompanying one telemetry event.
pub type Metadata = Map<String, Value>;

/// Dynamic trait object for the telemetry sink.
pub type TelemetrySinkService = Arc<dyn TelemetrySink + Send + Sync>;

/// A four-method sink implementations can provide to receive the broker's
/// structured log events alongside its own `tracing` output.
#[async_trait]
pub trait TelemetrySink {
    /// Records an informational event.
    async fn info(&self, message: &str, metadata: Metadata);
    /// Records a warning event.
    async fn warn(&self, message: &str, metadata: Metadata);
    /// Records an error event.
    async fn error(&self, message: &str, metadata: Metadata);
    /// Records a debug event.
    async fn debug(&self, message: &str, metadata: Metadata);
}

/// Default sink: forwards every event to `tracing` and increments the
/// `logs_total{level}` counter exposed on `/metrics`.
pub struct TracingTelemetrySink;

#[async_trait]
impl TelemetrySink for TracingTelemetrySink {
    async fn info(&self, message: &str, metadata: Metadata) {
        metrics::counter!(METRICS_ID_LOGS_TOTAL, "level" => "info").increment(1);
        tracing::info!(?metadata, "{message}");
    }

    async fn warn(&self, message: &str, metadata: Metadata) {
        metrics::counter!(METRICS_ID_LOGS_TOTAL, "level" => "warn").increment(1);
        tracing::warn!(?metadata, "{message}");
    }

    async fn error(&self, message: &str, metadata: Metadata) {
        metrics::counter!(METRICS_ID_LOGS_TOTAL, "level" => "error").increment(1);
        tracing::error!(?metadata, "{message}");
    }

    async fn debug(&self, message: &str, metadata: Metadata) {
        metrics::counter!(METRICS_ID_LOGS_TOTAL, "level" => "debug").increment(1);
        tracing::debug!(?metadata, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_sink_accepts_every_level() {
        let sink = TracingTelemetrySink;
        sink.info("info event", Metadata::new()).await;
        sink.warn("warn event", Metadata::new()).await;
        sink.error("error event", Metadata::new()).await;
        sink.debug("debug event", Metadata::new()).await;
    }
}
