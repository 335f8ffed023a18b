//! Daily counter-reset background task.
//!
//! On a fixed interval, attempts to acquire a fleet-wide distributed lock and
//! performs one bulk reset of every API key's daily request counter. The
//! lock, not any in-process state, is what guarantees only one process in a
//! fleet performs the reset on a given tick.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::metrics::METRICS_ID_DAILY_RESET_SUCCESS;
use crate::services::credential_store::CredentialStoreService;
use crate::services::distributed_lock::DistributedLockService;

const LOCK_KEY: &str = "worldlink.broker.daily_reset";

/// Arguments for [`daily_reset_task`].
pub struct DailyResetTaskArgs {
    /// How often to attempt the reset.
    pub interval: Duration,
    /// TTL granted to the distributed lock while the reset runs.
    pub lock_ttl: Duration,
    /// The credential/quota backend whose counters get reset.
    pub credential_store: CredentialStoreService,
    /// The distributed lock backend.
    pub distributed_lock: DistributedLockService,
    /// Cancelled to stop the task during graceful shutdown.
    pub cancellation_token: CancellationToken,
}

/// Background task that periodically resets every key's daily quota.
///
/// Every process in a fleet runs this task; on each tick only the one that
/// wins the distributed lock actually performs the reset.
pub async fn daily_reset_task(args: DailyResetTaskArgs) {
    let DailyResetTaskArgs {
        interval,
        lock_ttl,
        credential_store,
        distributed_lock,
        cancellation_token,
    } = args;

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancellation_token.cancelled() => {
                tracing::info!("daily reset task shutting down");
                return;
            }
        }

        let Some(guard) = distributed_lock.try_acquire(LOCK_KEY, lock_ttl).await else {
            tracing::debug!("another process holds the daily-reset lock, skipping this tick");
            continue;
        };

        match credential_store.reset_daily_counters().await {
            Ok(()) => {
                metrics::counter!(METRICS_ID_DAILY_RESET_SUCCESS).increment(1);
                tracing::info!("daily counters reset");
            }
            Err(err) => tracing::error!("daily counter reset failed: {err:?}"),
        }

        guard.release().await;
    }
}
