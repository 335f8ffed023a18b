//! Types the pluggable credential/quota adapter deals in. The broker reads
//! these; it does not own their storage (see `worldlink_broker::services::credential_store`).

use serde::{Deserialize, Serialize};

/// A snapshot of one API key's standing, as the credential store reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The API key this record describes.
    pub api_key: String,
    /// The user the key belongs to.
    pub user_id: String,
    /// Requests already counted against today's quota.
    pub requests_today: u32,
    /// The daily request ceiling for this key.
    pub daily_quota: u32,
    /// Date (`YYYY-MM-DD`) `requests_today` was last incremented for.
    pub last_request_date: String,
}

/// Failures from the authentication half of the credential adapter.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No record exists for the given API key.
    #[error("unknown api key")]
    UnknownApiKey,
    /// The credential backend itself could not be reached.
    #[error("credential backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Failures from the quota half of the credential adapter.
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// The key has exhausted its daily quota.
    #[error("daily quota exceeded")]
    QuotaExceeded,
    /// The credential backend itself could not be reached.
    #[error("credential backend unavailable: {0}")]
    BackendUnavailable(String),
}
