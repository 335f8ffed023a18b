//! Runnable relay broker binary, wiring [`worldlink_broker::BrokerServiceBuilder`]
//! to in-memory reference adapters, a Prometheus exporter, and graceful
//! shutdown on SIGINT/SIGTERM.
//!
//! The in-memory credential store, world-event sink, and distributed lock
//! are stand-ins: see [`memory_adapters`] for why they are not meant for
//! production.

mod memory_adapters;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use worldlink_broker::config::BrokerConfig;
use worldlink_broker::services::telemetry::TracingTelemetrySink;
use worldlink_broker::services::world_events::LoggingWorldEventSink;
use worldlink_broker::BrokerServiceBuilder;

use crate::memory_adapters::{DemoCredential, InMemoryCredentialStore, SharedInMemoryDistributedLock};

/// The configuration for the relay broker binary.
///
/// Configurable via environment variables or command line arguments using `clap`.
#[derive(Parser, Debug)]
struct ServerConfig {
    /// The bind address of the REST/WebSocket axum server.
    #[clap(long, env = "BIND_ADDR", default_value = "0.0.0.0:8787")]
    bind_addr: SocketAddr,

    /// The bind address the Prometheus `/metrics` exporter listens on.
    #[clap(long, env = "METRICS_BIND_ADDR", default_value = "0.0.0.0:9464")]
    metrics_bind_addr: SocketAddr,

    /// Max wait time the service waits for its background tasks during shutdown.
    #[clap(
        long,
        env = "SHUTDOWN_GRACE_PERIOD",
        default_value = "10s",
        value_parser = humantime::parse_duration,
    )]
    shutdown_grace_period: Duration,

    /// The log level passed to the `tracing` env filter.
    #[clap(long, env = "LOG_LEVEL", default_value = "worldlink_broker=info,worldlink_server=info,tower_http=info")]
    log_level: String,

    /// The broker's core configuration.
    #[clap(flatten)]
    broker_config: BrokerConfig,
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .init();

    tracing::info!("starting worldlink-server with config: {config:#?}");

    PrometheusBuilder::new()
        .with_http_listener(config.metrics_bind_addr)
        .install()
        .map_err(|err| eyre::eyre!("failed to install prometheus exporter: {err}"))?;

    let credential_store = Arc::new(InMemoryCredentialStore::new(vec![DemoCredential {
        api_key: "demo-api-key".to_owned(),
        user_id: "demo-user".to_owned(),
        daily_quota: 1000,
        world: ("demo-world".to_owned(), "demo-token".to_owned()),
    }]));
    let distributed_lock = Arc::new(SharedInMemoryDistributedLock::new());
    let world_event_sink = Arc::new(LoggingWorldEventSink);
    let telemetry = Arc::new(TracingTelemetrySink);

    let cancellation_token = CancellationToken::new();
    let (router, background_tasks, shutdown_handle) = BrokerServiceBuilder::init(
        config.broker_config,
        credential_store,
        distributed_lock,
        world_event_sink,
        telemetry,
        cancellation_token.clone(),
    )
    .build();

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");

    let serve_cancel = cancellation_token.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { serve_cancel.cancelled().await })
            .await;
        if let Err(err) = result {
            tracing::error!("axum server error: {err}");
        }
    });

    shutdown_signal().await;
    tracing::info!("shutdown signal received, closing sessions and cancelling background tasks");
    cancellation_token.cancel();

    match tokio::time::timeout(config.shutdown_grace_period, async {
        // Fails every outstanding waiter and closes every session first:
        // axum's graceful shutdown only waits for in-flight requests to
        // finish, and those requests are themselves blocked here.
        shutdown_handle.shutdown().await;
        let _ = server.await;
        for task in background_tasks {
            let _ = task.await;
        }
    })
    .await
    {
        Ok(()) => tracing::info!("shut down cleanly"),
        Err(_) => tracing::warn!("shutdown grace period elapsed before all tasks finished"),
    }

    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
