//! The dispatcher: the single reusable helper every REST endpoint calls to
//! extract a target session, correlate a request/response pair with the
//! world, and translate the outcome into an HTTP response.
//!
//! Restructured from the teacher's single-function-per-protocol-step shape
//! (`api::oprf::partial_oprf`) into one function parameterized over an
//! operation, since every REST endpoint here performs the identical
//! send-then-await dance and differs only in which operation and payload it
//! sends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Map;
use uuid::Uuid;
use worldlink_types::{Envelope, Operation};

use crate::errors::ApiError;
use crate::metrics::{
    METRICS_ID_DISPATCH_COMPLETED, METRICS_ID_DISPATCH_DURATION, METRICS_ID_DISPATCH_STARTED,
    METRICS_ID_DISPATCH_TIMEOUT, METRICS_ID_DISPATCH_WORLD_OFFLINE,
};
use crate::services::pending::{Outcome, PendingTable, WaitResult};
use crate::services::registry::Registry;
use crate::services::telemetry::{Metadata, TelemetrySinkService};

/// Shared handles the dispatcher needs on every call.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    pending: Arc<PendingTable>,
    request_timeout: Duration,
    telemetry: TelemetrySinkService,
}

impl Dispatcher {
    /// Builds a dispatcher over the given registry and pending table.
    pub fn new(
        registry: Arc<Registry>,
        pending: Arc<PendingTable>,
        request_timeout: Duration,
        telemetry: TelemetrySinkService,
    ) -> Self {
        Self {
            registry,
            pending,
            request_timeout,
            telemetry,
        }
    }

    /// Sends `operation` with `payload` to `client_id`'s world and awaits its
    /// reply, translating the outcome per the REST surface's status-code
    /// contract.
    pub async fn dispatch(
        &self,
        operation: Operation,
        client_id: &str,
        payload: Map<String, serde_json::Value>,
    ) -> Result<Map<String, serde_json::Value>, ApiError> {
        metrics::counter!(METRICS_ID_DISPATCH_STARTED, "operation" => operation.as_str())
            .increment(1);
        let started = Instant::now();

        let session = self.registry.get(client_id).ok_or_else(|| {
            metrics::counter!(METRICS_ID_DISPATCH_WORLD_OFFLINE, "operation" => operation.as_str())
                .increment(1);
            ApiError::WorldOffline
        });
        let session = match session {
            Ok(session) => session,
            Err(err) => {
                self.telemetry
                    .warn("dispatch rejected: world offline", dispatch_metadata(operation, client_id))
                    .await;
                return Err(err);
            }
        };

        let request_id = Uuid::new_v4();
        self.registry.track_request(client_id, request_id);
        let guard = InFlightGuard {
            registry: &self.registry,
            pending: &self.pending,
            client_id,
            request_id,
        };

        let waiter = self.pending.register(request_id, self.request_timeout);
        let envelope = Envelope::request(operation, request_id, client_id, payload);
        if let Err(err) = session.send(&envelope).await {
            tracing::warn!(%request_id, client_id, "failed to send envelope to world: {err}");
            self.telemetry
                .warn("dispatch failed: upstream send failed", dispatch_metadata(operation, client_id))
                .await;
            drop(guard);
            return Err(ApiError::UpstreamSendFailed);
        }

        let result = waiter.await_result().await;
        drop(guard);

        metrics::histogram!(METRICS_ID_DISPATCH_DURATION, "operation" => operation.as_str())
            .record(started.elapsed().as_millis() as f64);

        match result {
            WaitResult::Reply(reply) if reply.is_error() => {
                let error = reply.error.unwrap_or_else(|| "unknown error".to_owned());
                self.telemetry
                    .warn("dispatch failed: world reported error", dispatch_metadata(operation, client_id))
                    .await;
                Err(ApiError::WorldReportedError(error))
            }
            WaitResult::Reply(reply) => {
                metrics::counter!(METRICS_ID_DISPATCH_COMPLETED, "operation" => operation.as_str())
                    .increment(1);
                Ok(reply.payload)
            }
            WaitResult::Failed(Outcome::Timeout) => {
                metrics::counter!(METRICS_ID_DISPATCH_TIMEOUT, "operation" => operation.as_str())
                    .increment(1);
                self.telemetry
                    .warn("dispatch failed: upstream timeout", dispatch_metadata(operation, client_id))
                    .await;
                Err(ApiError::UpstreamTimeout)
            }
            WaitResult::Failed(Outcome::SessionLost) => Err(ApiError::WorldDisconnected),
            WaitResult::Failed(Outcome::Cancelled) => Err(ApiError::WorldDisconnected),
        }
    }
}

/// Builds the structured-metadata bag attached to a dispatch telemetry event.
fn dispatch_metadata(operation: Operation, client_id: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("operation".to_owned(), operation.as_str().into());
    metadata.insert("clientId".to_owned(), client_id.into());
    metadata
}

/// Drains the registry's in-flight index and fails any still-registered
/// waiter with `Cancelled` on drop. Covers the caller-disconnected path: if
/// this future is dropped before `await_result` resolves, the waiter is
/// freed immediately instead of waiting out the full deadline. A no-op if
/// the request already resolved (`fail`/`untrack` are idempotent).
struct InFlightGuard<'a> {
    registry: &'a Registry,
    pending: &'a PendingTable,
    client_id: &'a str,
    request_id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.pending.fail(self.request_id, Outcome::Cancelled);
        self.registry.untrack_request(self.client_id, &self.request_id);
    }
}
