//! Shared harness for the end-to-end scenarios in `broker_test_suite.rs`.
//!
//! Mirrors the teacher's `tests/setup.rs` shape: a `TestNode`-like wrapper
//! around an `axum_test::TestServer` built from the real service builder,
//! plus minimal in-memory stand-ins for the pluggable adapters so a test can
//! drive the whole stack without a real credential backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::{TestServer, TestWebSocket};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use worldlink_broker::config::BrokerConfig;
use worldlink_broker::services::credential_store::CredentialStore;
use worldlink_broker::services::distributed_lock::{DistributedLock, LockGuard};
use worldlink_broker::services::telemetry::TracingTelemetrySink;
use worldlink_broker::services::world_events::WorldEventSink;
use worldlink_broker::BrokerServiceBuilder;
use worldlink_types::{AuthError, CredentialRecord, Envelope, QuotaError};

/// The default API key / world pair every test world connects with.
pub const API_KEY: &str = "test-api-key";
pub const WORLD_ID: &str = "W1";
pub const WORLD_TOKEN: &str = "test-token";

pub struct TestCredentialStore {
    api_key: String,
    quota: u32,
    used: AtomicU32,
    worlds: DashMap<String, String>,
}

impl TestCredentialStore {
    fn new(quota: u32) -> Self {
        let worlds = DashMap::new();
        worlds.insert(WORLD_ID.to_owned(), WORLD_TOKEN.to_owned());
        Self {
            api_key: API_KEY.to_owned(),
            quota,
            used: AtomicU32::new(0),
            worlds,
        }
    }
}

#[async_trait]
impl CredentialStore for TestCredentialStore {
    async fn authenticate_rest(&self, api_key: &str) -> Result<CredentialRecord, AuthError> {
        if api_key != self.api_key {
            return Err(AuthError::UnknownApiKey);
        }
        Ok(CredentialRecord {
            api_key: self.api_key.clone(),
            user_id: "test-user".to_owned(),
            requests_today: self.used.load(Ordering::Relaxed),
            daily_quota: self.quota,
            last_request_date: String::new(),
        })
    }

    async fn check_and_increment_quota(&self, api_key: &str) -> Result<(), QuotaError> {
        if api_key != self.api_key {
            return Err(QuotaError::BackendUnavailable("unknown api key".to_owned()));
        }
        let used = self.used.fetch_add(1, Ordering::Relaxed) + 1;
        if used > self.quota {
            self.used.fetch_sub(1, Ordering::Relaxed);
            return Err(QuotaError::QuotaExceeded);
        }
        Ok(())
    }

    async fn validate_headless_session(&self, client_id: &str, token: &str) -> bool {
        self.worlds.get(client_id).is_some_and(|expected| expected.as_str() == token)
    }

    async fn reset_daily_counters(&self) -> Result<(), AuthError> {
        self.used.store(0, Ordering::Relaxed);
        Ok(())
    }
}

struct NoopLockGuard;

#[async_trait]
impl LockGuard for NoopLockGuard {
    async fn release(self: Box<Self>) {}
}

/// Always grants the lock; the daily-reset job is not under test here.
pub struct NoopDistributedLock;

#[async_trait]
impl DistributedLock for NoopDistributedLock {
    async fn try_acquire(&self, _key: &str, _ttl: Duration) -> Option<Box<dyn LockGuard>> {
        Some(Box::new(NoopLockGuard))
    }
}

/// Records every envelope pushed without a matching `requestId`.
#[derive(Default)]
pub struct RecordingWorldEventSink {
    pub events: DashMap<String, Vec<Envelope>>,
}

#[async_trait]
impl WorldEventSink for RecordingWorldEventSink {
    async fn on_world_event(&self, client_id: &str, envelope: Envelope) {
        self.events.entry(client_id.to_owned()).or_default().push(envelope);
    }
}

/// A running broker under test, with its own cancellation scope.
pub struct TestBroker {
    pub server: TestServer,
    _cancellation_token: CancellationToken,
}

impl TestBroker {
    /// Boots a broker with the default config and a single demo API key with
    /// the given daily quota.
    pub async fn start(quota: u32) -> Self {
        Self::start_with_config(default_config(), quota).await
    }

    pub async fn start_with_config(config: BrokerConfig, quota: u32) -> Self {
        let cancellation_token = CancellationToken::new();
        let credential_store = Arc::new(TestCredentialStore::new(quota));
        let distributed_lock = Arc::new(NoopDistributedLock);
        let world_event_sink = Arc::new(RecordingWorldEventSink::default());
        let telemetry = Arc::new(TracingTelemetrySink);

        let (router, _background_tasks, _shutdown_handle) = BrokerServiceBuilder::init(
            config,
            credential_store,
            distributed_lock,
            world_event_sink,
            telemetry,
            cancellation_token.clone(),
        )
        .build();

        let server = TestServer::builder()
            .http_transport()
            .build(router)
            .expect("can build test server");

        Self {
            server,
            _cancellation_token: cancellation_token,
        }
    }

    /// Opens a world websocket connection for `client_id`/`token`, returning
    /// the raw `TestWebSocket` once the handshake upgrade completes.
    pub async fn connect_world(&self, client_id: &str, token: &str) -> TestWebSocket {
        self.server
            .get_websocket(&format!("/?id={client_id}&token={token}"))
            .await
            .into_websocket()
            .await
    }
}

/// Short timeouts so timeout/sweep scenarios don't slow the suite down.
pub fn default_config() -> BrokerConfig {
    BrokerConfig {
        client_inactivity_timeout: Duration::from_millis(200),
        websocket_ping_interval: Duration::from_secs(30),
        client_cleanup_interval: Duration::from_millis(50),
        request_timeout: Duration::from_millis(200),
        ws_max_message_size: 65536,
        daily_reset_interval: Duration::from_secs(3600),
        daily_reset_lock_ttl: Duration::from_secs(60),
    }
}

/// Builds a successful `<op>-result` reply envelope for `request_id`.
pub fn reply_envelope(request_id: Uuid, payload: Map<String, Value>) -> Envelope {
    Envelope {
        kind: "entity-result".to_owned(),
        request_id: Some(request_id),
        client_id: None,
        payload,
        error: None,
    }
}

/// Builds an error reply envelope for `request_id`.
pub fn error_envelope(request_id: Uuid, error: impl Into<String>) -> Envelope {
    Envelope {
        kind: "entity-result".to_owned(),
        request_id: Some(request_id),
        client_id: None,
        payload: Map::new(),
        error: Some(error.into()),
    }
}
