//! In-memory reference implementations of the broker's pluggable adapters.
//!
//! These exist so the binary can run standalone for local development and
//! the example's own tests. They hold no state across restarts and are not
//! meant for production use — a real deployment swaps in adapters backed by
//! a shared store (Redis, Postgres, ...) without touching `worldlink-broker`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use worldlink_broker::services::credential_store::CredentialStore;
use worldlink_broker::services::distributed_lock::{DistributedLock, LockGuard};
use worldlink_types::{AuthError, CredentialRecord, QuotaError};

/// An API key, its quota state, and the `(clientId, token)` pair it is
/// allowed to connect a world under.
pub struct DemoCredential {
    /// The bearer API key REST callers present.
    pub api_key: String,
    /// The user the key belongs to, echoed in the credential record.
    pub user_id: String,
    /// The daily request ceiling for this key.
    pub daily_quota: u32,
    /// The world identity and handshake token this key's world connects with.
    pub world: (String, String),
}

/// Single-process credential/quota store, seeded at construction and reset
/// whenever `reset_daily_counters` is called.
pub struct InMemoryCredentialStore {
    records: DashMap<String, (CredentialRecord, AtomicI64)>,
    world_tokens: DashMap<String, String>,
}

impl InMemoryCredentialStore {
    /// Builds a store seeded with `credentials`.
    pub fn new(credentials: Vec<DemoCredential>) -> Self {
        let records = DashMap::new();
        let world_tokens = DashMap::new();
        for cred in credentials {
            let (client_id, token) = cred.world;
            world_tokens.insert(client_id, token);
            records.insert(
                cred.api_key.clone(),
                (
                    CredentialRecord {
                        api_key: cred.api_key,
                        user_id: cred.user_id,
                        requests_today: 0,
                        daily_quota: cred.daily_quota,
                        last_request_date: String::new(),
                    },
                    AtomicI64::new(0),
                ),
            );
        }
        Self {
            records,
            world_tokens,
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn authenticate_rest(&self, api_key: &str) -> Result<CredentialRecord, AuthError> {
        self.records
            .get(api_key)
            .map(|entry| entry.0.clone())
            .ok_or(AuthError::UnknownApiKey)
    }

    async fn check_and_increment_quota(&self, api_key: &str) -> Result<(), QuotaError> {
        let entry = self
            .records
            .get(api_key)
            .ok_or(QuotaError::BackendUnavailable("unknown api key".to_owned()))?;
        let used = entry.1.fetch_add(1, Ordering::Relaxed) + 1;
        if used > i64::from(entry.0.daily_quota) {
            entry.1.fetch_sub(1, Ordering::Relaxed);
            return Err(QuotaError::QuotaExceeded);
        }
        Ok(())
    }

    async fn validate_headless_session(&self, client_id: &str, token: &str) -> bool {
        self.world_tokens
            .get(client_id)
            .is_some_and(|expected| expected.as_str() == token)
    }

    async fn reset_daily_counters(&self) -> Result<(), AuthError> {
        for entry in self.records.iter() {
            entry.1.store(0, Ordering::Relaxed);
        }
        Ok(())
    }
}

struct InMemoryLockGuard {
    held: std::sync::Weak<DashMap<String, Instant>>,
    key: String,
}

#[async_trait]
impl LockGuard for InMemoryLockGuard {
    async fn release(self: Box<Self>) {
        if let Some(held) = self.held.upgrade() {
            held.remove(&self.key);
        }
    }
}

/// Single-process distributed lock: fine for one replica, a placeholder for
/// the fleet-wide lock a multi-process deployment needs.
#[derive(Default, Clone)]
pub struct SharedInMemoryDistributedLock(std::sync::Arc<DashMap<String, Instant>>);

impl SharedInMemoryDistributedLock {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLock for SharedInMemoryDistributedLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Option<Box<dyn LockGuard>> {
        let now = Instant::now();
        let mut acquired = false;
        self.0
            .entry(key.to_owned())
            .and_modify(|expiry| {
                if *expiry <= now {
                    *expiry = now + ttl;
                    acquired = true;
                }
            })
            .or_insert_with(|| {
                acquired = true;
                now + ttl
            });
        if !acquired {
            return None;
        }
        Some(Box::new(InMemoryLockGuard {
            held: std::sync::Arc::downgrade(&self.0),
            key: key.to_owned(),
        }))
    }
}
