use chrono::Duration;
use tracing::{info, warn};

use crate::db::ItemStore;
use crate::error::Result;
use crate::types::{format_timestamp, now_naive, parse_timestamp, RunLock};

/// Result of an acquire attempt. Busy is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    Busy,
}

/// Advisory mutual exclusion over the shared lock row.
///
/// The read and the subsequent write are not atomic — there is a narrow race
/// window in which two invocations can both see the row absent and both
/// proceed. Accepted tradeoff: triggers fire rarely and a double scan is
/// harmless. Do not paper over it with blocking semantics.
pub struct RunLockManager {
    store: ItemStore,
    ttl_minutes: i64,
}

impl RunLockManager {
    pub fn new(store: ItemStore, ttl_minutes: i64) -> Self {
        Self { store, ttl_minutes }
    }

    /// Check the lock row and claim it if free. A present, unexpired lock
    /// reports Busy; an expired or unparsable one is deleted and reclaimed.
    pub async fn acquire(&self, function_name: &str) -> Result<AcquireOutcome> {
        if let Some(existing) = self.store.get_lock().await? {
            match parse_timestamp(&existing.started_at) {
                Some(started_at) => {
                    let elapsed_minutes =
                        now_naive().signed_duration_since(started_at).num_seconds() as f64 / 60.0;
                    info!(
                        "lock check — started_at: {}, elapsed: {elapsed_minutes:.1}m, ttl: {}m",
                        existing.started_at, self.ttl_minutes,
                    );
                    if elapsed_minutes >= 0.0 && elapsed_minutes < self.ttl_minutes as f64 {
                        info!("scan already running (held by {})", existing.function_name);
                        return Ok(AcquireOutcome::Busy);
                    }
                    info!("lock expired after {elapsed_minutes:.1}m — removing stale record");
                    self.store.delete_lock().await?;
                }
                None => {
                    warn!(
                        "unparsable lock started_at {:?} — removing stale record",
                        existing.started_at,
                    );
                    self.store.delete_lock().await?;
                }
            }
        }

        let started_at = now_naive();
        let expires_at = started_at + Duration::minutes(self.ttl_minutes);
        self.store
            .put_lock(&RunLock {
                status: "running".to_string(),
                started_at: format_timestamp(started_at),
                expires_at: format_timestamp(expires_at),
                function_name: function_name.to_string(),
            })
            .await?;
        info!("run lock acquired (ttl: {}m)", self.ttl_minutes);
        Ok(AcquireOutcome::Acquired)
    }

    /// Unconditionally delete the lock row. Must run on every exit path of a
    /// cycle that acquired it; deleting an absent row is fine.
    pub async fn release(&self) -> Result<()> {
        self.store.delete_lock().await?;
        info!("run lock released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::memory_store;
    use chrono::Duration;

    #[tokio::test]
    async fn acquire_when_free_succeeds() {
        let store = memory_store().await;
        let lock = RunLockManager::new(store.clone(), 60);
        assert_eq!(lock.acquire("test-fn").await.unwrap(), AcquireOutcome::Acquired);

        let held = store.get_lock().await.unwrap().expect("lock row written");
        assert_eq!(held.status, "running");
        assert_eq!(held.function_name, "test-fn");
    }

    #[tokio::test]
    async fn acquire_while_held_reports_busy() {
        let store = memory_store().await;
        let lock = RunLockManager::new(store.clone(), 60);
        assert_eq!(lock.acquire("first").await.unwrap(), AcquireOutcome::Acquired);
        assert_eq!(lock.acquire("second").await.unwrap(), AcquireOutcome::Busy);
    }

    #[tokio::test]
    async fn expired_lock_is_self_healed() {
        let store = memory_store().await;
        let stale_start = now_naive() - Duration::minutes(120);
        store
            .put_lock(&RunLock {
                status: "running".to_string(),
                started_at: format_timestamp(stale_start),
                expires_at: format_timestamp(stale_start + Duration::minutes(60)),
                function_name: "crashed".to_string(),
            })
            .await
            .unwrap();

        let lock = RunLockManager::new(store.clone(), 60);
        assert_eq!(lock.acquire("fresh").await.unwrap(), AcquireOutcome::Acquired);

        let held = store.get_lock().await.unwrap().expect("reclaimed lock");
        assert_eq!(held.function_name, "fresh");
    }

    #[tokio::test]
    async fn unparsable_lock_is_self_healed() {
        let store = memory_store().await;
        store
            .put_lock(&RunLock {
                status: "running".to_string(),
                started_at: "garbage".to_string(),
                expires_at: String::new(),
                function_name: "broken".to_string(),
            })
            .await
            .unwrap();

        let lock = RunLockManager::new(store, 60);
        assert_eq!(lock.acquire("fresh").await.unwrap(), AcquireOutcome::Acquired);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = memory_store().await;
        let lock = RunLockManager::new(store, 60);
        lock.release().await.unwrap();
        lock.acquire("fn").await.unwrap();
        lock.release().await.unwrap();
        lock.release().await.unwrap();
    }
}
