//! Metrics definitions for the relay broker.
//!
//! This module defines all metrics keys used by the broker and
//! provides a helper [`describe_metrics`] to set metadata for
//! each metric using the `metrics` crate.

/// Metrics key for currently open (registered) sessions.
pub const METRICS_ID_SESSIONS_OPEN: &str = "worldlink.broker.sessions.open";
/// Metrics key for sessions evicted by the inactivity sweep.
pub const METRICS_ID_SESSIONS_SWEPT: &str = "worldlink.broker.sessions.swept";
/// Metrics key for sessions superseded by a newer connection for the same id.
pub const METRICS_ID_SESSIONS_SUPERSEDED: &str = "worldlink.broker.sessions.superseded";
/// Metrics key for dispatched requests, by operation.
pub const METRICS_ID_DISPATCH_STARTED: &str = "worldlink.broker.dispatch.started";
/// Metrics key for dispatches that completed with a world-provided result.
pub const METRICS_ID_DISPATCH_COMPLETED: &str = "worldlink.broker.dispatch.completed";
/// Metrics key for dispatches that timed out waiting for a reply.
pub const METRICS_ID_DISPATCH_TIMEOUT: &str = "worldlink.broker.dispatch.timeout";
/// Metrics key for dispatches that failed because the target world was offline.
pub const METRICS_ID_DISPATCH_WORLD_OFFLINE: &str = "worldlink.broker.dispatch.world_offline";
/// Metrics key for the duration of a dispatch from send to resolution.
pub const METRICS_ID_DISPATCH_DURATION: &str = "worldlink.broker.dispatch.duration";
/// Metrics key for late/unmatched reply envelopes dropped by the correlator.
pub const METRICS_ID_PENDING_UNMATCHED: &str = "worldlink.broker.pending.unmatched";
/// Metrics key for successful daily counter-reset runs.
pub const METRICS_ID_DAILY_RESET_SUCCESS: &str = "worldlink.broker.daily_reset.success";
/// Metrics key for structured log events emitted through the telemetry sink, by level.
pub const METRICS_ID_LOGS_TOTAL: &str = "worldlink.broker.logs.total";

/// Describe all metrics used by the broker.
///
/// This calls the `describe_*` functions from the `metrics` crate to set metadata on the different metrics.
pub fn describe_metrics() {
    metrics::describe_gauge!(
        METRICS_ID_SESSIONS_OPEN,
        metrics::Unit::Count,
        "Number of open sessions the broker has registered"
    );

    metrics::describe_counter!(
        METRICS_ID_SESSIONS_SWEPT,
        metrics::Unit::Count,
        "Number of sessions removed by the inactivity sweep"
    );

    metrics::describe_counter!(
        METRICS_ID_SESSIONS_SUPERSEDED,
        metrics::Unit::Count,
        "Number of sessions closed because a newer connection took their id"
    );

    metrics::describe_counter!(
        METRICS_ID_DISPATCH_STARTED,
        metrics::Unit::Count,
        "Number of REST dispatches started"
    );

    metrics::describe_counter!(
        METRICS_ID_DISPATCH_COMPLETED,
        metrics::Unit::Count,
        "Number of REST dispatches that received a world reply"
    );

    metrics::describe_counter!(
        METRICS_ID_DISPATCH_TIMEOUT,
        metrics::Unit::Count,
        "Number of REST dispatches that timed out waiting for a reply"
    );

    metrics::describe_counter!(
        METRICS_ID_DISPATCH_WORLD_OFFLINE,
        metrics::Unit::Count,
        "Number of REST dispatches rejected because the target world was offline"
    );

    metrics::describe_histogram!(
        METRICS_ID_DISPATCH_DURATION,
        metrics::Unit::Milliseconds,
        "Duration of a REST dispatch from send to resolution"
    );

    metrics::describe_counter!(
        METRICS_ID_PENDING_UNMATCHED,
        metrics::Unit::Count,
        "Number of reply envelopes dropped because no waiter matched their requestId"
    );

    metrics::describe_counter!(
        METRICS_ID_DAILY_RESET_SUCCESS,
        metrics::Unit::Count,
        "Number of successful daily counter-reset runs"
    );

    metrics::describe_counter!(
        METRICS_ID_LOGS_TOTAL,
        metrics::Unit::Count,
        "Number of structured log events emitted through the telemetry sink, by level"
    );
}
