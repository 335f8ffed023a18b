//! Pluggable credential and quota backend.
//!
//! The broker never persists API keys or per-key counters itself; it reads
//! them through this trait. Mirrors the teacher's `SecretManager` /
//! `SecretManagerService` shape: an object-safe async trait behind an `Arc`.

use async_trait::async_trait;
use worldlink_types::{AuthError, CredentialRecord, QuotaError};

/// Dynamic trait object for the credential/quota backend.
///
/// Must be `Send + Sync` to work with async contexts (e.g. Axum).
pub type CredentialStoreService = std::sync::Arc<dyn CredentialStore + Send + Sync>;

/// Implementations persist and query API-key credentials and daily quotas,
/// and validate the `id`/`token` pair presented at WebSocket handshake.
#[async_trait]
pub trait CredentialStore {
    /// Looks up the record for a REST caller's API key.
    async fn authenticate_rest(&self, api_key: &str) -> Result<CredentialRecord, AuthError>;

    /// Atomically checks and increments today's request count for `api_key`.
    async fn check_and_increment_quota(&self, api_key: &str) -> Result<(), QuotaError>;

    /// Validates the `id`/`token` pair a world presents at WebSocket handshake.
    async fn validate_headless_session(&self, client_id: &str, token: &str) -> bool;

    /// Resets every key's daily counter. Invoked by the daily-reset job
    /// while it holds the distributed lock.
    async fn reset_daily_counters(&self) -> Result<(), AuthError>;
}
