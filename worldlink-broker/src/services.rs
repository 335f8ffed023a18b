//! Core services that make up the relay broker.
//!
//! Each service encapsulates a specific responsibility and is used by the
//! higher-level API handlers or the service builder.
//!
//! # Services overview
//!
//! - [`registry`] – bookkeeping of all currently connected worlds.
//! - [`pending`] – the request/response correlator.
//! - [`credential_store`] – pluggable auth/quota backend.
//! - [`world_events`] – pluggable sink for unsolicited world pushes.
//! - [`distributed_lock`] – fleet-wide mutual exclusion for the daily reset job.
//! - [`daily_reset`] – the daily counter-reset background task.
//! - [`sweep`] – the inactivity-eviction background task.
//! - [`telemetry`] – pluggable structured-log sink feeding `logs_total{level}`.

pub mod credential_store;
pub mod daily_reset;
pub mod distributed_lock;
pub mod pending;
pub mod registry;
pub mod sweep;
pub mod telemetry;
pub mod world_events;
