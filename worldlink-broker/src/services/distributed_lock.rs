//! Distributed lock abstraction used by the daily counter-reset job so that
//! exactly one process in a fleet performs the reset per day.

use async_trait::async_trait;
use std::time::Duration;

/// Dynamic trait object for the lock backend.
pub type DistributedLockService = std::sync::Arc<dyn DistributedLock + Send + Sync>;

/// A held lock. Dropping it without calling [`LockGuard::release`] simply
/// lets the lock expire after its TTL; `release` lets another process
/// proceed immediately via compare-and-delete semantics.
#[async_trait]
pub trait LockGuard: Send + Sync {
    /// Releases the lock early via a compare-and-delete against the token
    /// this guard was issued with.
    async fn release(self: Box<Self>);
}

/// Implementations provide a TTL'd mutual-exclusion lock keyed by string.
#[async_trait]
pub trait DistributedLock {
    /// Attempts to acquire `key` for `ttl`. Returns `None` if already held.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Option<Box<dyn LockGuard>>;
}
