#![deny(missing_docs)]
//! Core library of the request-relay broker sitting between stateless HTTP
//! REST clients and long-lived authenticated WebSocket world connections.
//!
//! The main entry point is [`BrokerServiceBuilder`]. It wires the
//! [`services::registry::Registry`], the [`services::pending::PendingTable`]
//! and the [`dispatcher::Dispatcher`] together, spawns the daily counter
//! reset and inactivity sweep background tasks, and returns an `axum::Router`
//! that a hosting binary merges into its own server.
//!
//! Authentication, quota accounting, and fleet-wide locking are supplied by
//! the hosting application through the [`services::credential_store::CredentialStore`],
//! [`services::distributed_lock::DistributedLock`] and
//! [`services::world_events::WorldEventSink`] traits; this crate ships no
//! concrete backend beyond what the example binary needs for a standalone
//! demo.

use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame};
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::BrokerConfig;
use crate::dispatcher::Dispatcher;
use crate::services::credential_store::CredentialStoreService;
use crate::services::daily_reset::{daily_reset_task, DailyResetTaskArgs};
use crate::services::distributed_lock::DistributedLockService;
use crate::services::pending::{Outcome, PendingTable};
use crate::services::registry::Registry;
use crate::services::sweep::{inactivity_sweep_task, InactivitySweepTaskArgs};
use crate::services::telemetry::TelemetrySinkService;
use crate::services::world_events::WorldEventSinkService;

pub(crate) mod api;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod metrics;
pub mod services;
pub mod session;
pub mod validation;

/// Initializes and assembles the relay broker.
///
/// Construct with [`BrokerServiceBuilder::init`], which spawns the
/// background tasks, then call [`BrokerServiceBuilder::build`] to get the
/// `axum::Router` and the background tasks' join handles.
pub struct BrokerServiceBuilder {
    config: BrokerConfig,
    registry: Arc<Registry>,
    pending: Arc<PendingTable>,
    dispatcher: Dispatcher,
    credential_store: CredentialStoreService,
    world_event_sink: WorldEventSinkService,
    background_tasks: Vec<JoinHandle<()>>,
}

impl BrokerServiceBuilder {
    /// Builds the Registry, Pending table and Dispatcher, describes this
    /// crate's metrics, and spawns the daily-reset and inactivity-sweep
    /// background tasks.
    pub fn init(
        config: BrokerConfig,
        credential_store: CredentialStoreService,
        distributed_lock: DistributedLockService,
        world_event_sink: WorldEventSinkService,
        telemetry: TelemetrySinkService,
        cancellation_token: CancellationToken,
    ) -> Self {
        metrics::describe_metrics();

        let registry = Arc::new(Registry::new());
        let pending = Arc::new(PendingTable::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&pending),
            config.request_timeout,
            telemetry,
        );

        let daily_reset = tokio::spawn(daily_reset_task(DailyResetTaskArgs {
            interval: config.daily_reset_interval,
            lock_ttl: config.daily_reset_lock_ttl,
            credential_store: Arc::clone(&credential_store),
            distributed_lock,
            cancellation_token: cancellation_token.clone(),
        }));

        let sweep = tokio::spawn(inactivity_sweep_task(InactivitySweepTaskArgs {
            interval: config.client_cleanup_interval,
            idle_threshold: config.client_inactivity_timeout,
            registry: Arc::clone(&registry),
            pending: Arc::clone(&pending),
            cancellation_token,
        }));

        Self {
            config,
            registry,
            pending,
            dispatcher,
            credential_store,
            world_event_sink,
            background_tasks: vec![daily_reset, sweep],
        }
    }

    /// Builds the `axum::Router` covering `/health`, `/entity/*` and the
    /// world-facing WebSocket endpoint, plus the background tasks' join
    /// handles and the [`BrokerShutdown`] handle for the hosting application
    /// to drive during shutdown.
    pub fn build(self) -> (Router, Vec<JoinHandle<()>>, BrokerShutdown) {
        let shutdown = BrokerShutdown {
            registry: Arc::clone(&self.registry),
            pending: Arc::clone(&self.pending),
        };

        let ws_state = api::ws::WsState {
            registry: Arc::clone(&self.registry),
            pending: Arc::clone(&self.pending),
            credential_store: Arc::clone(&self.credential_store),
            world_event_sink: self.world_event_sink,
            ws_max_message_size: self.config.ws_max_message_size,
            ping_interval: self.config.websocket_ping_interval,
        };
        let entities_state = api::entities::EntitiesState {
            dispatcher: self.dispatcher,
            credential_store: self.credential_store,
        };

        let router = Router::new()
            .merge(api::health::routes())
            .merge(api::entities::routes(entities_state))
            .merge(api::ws::routes(ws_state))
            .layer(TraceLayer::new_for_http());

        (router, self.background_tasks, shutdown)
    }
}

/// Graceful-shutdown teardown handle: fails every outstanding waiter so a
/// blocked HTTP handler can return promptly, then closes every live session.
///
/// Call [`BrokerShutdown::shutdown`] before or alongside awaiting the
/// hosting server's own graceful-shutdown future — `axum::serve`'s graceful
/// shutdown only waits for in-flight requests to finish, and those requests
/// are themselves blocked on the pending table until this runs.
pub struct BrokerShutdown {
    registry: Arc<Registry>,
    pending: Arc<PendingTable>,
}

impl BrokerShutdown {
    /// Fails every outstanding waiter with [`Outcome::Cancelled`], then
    /// drains the registry and closes each session with a normal close frame.
    pub async fn shutdown(self) {
        self.pending.fail_all_remaining(Outcome::Cancelled);
        for session in self.registry.drain_all() {
            session
                .close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: "server shutting down".into(),
                }))
                .await;
        }
    }
}
