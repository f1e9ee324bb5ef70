use std::sync::Arc;
use std::time::Duration;

use dedup_metrics::{DEDUP_EXPIRED_PURGED_TOTAL, DEDUP_STORE_ERRORS_TOTAL};
use tokio::time;

use super::RecordStore;

/// Background task that periodically removes expired dedup records
///
/// Only the relational store needs it; for Redis each tick is a no-op.
pub struct ExpiredRecordReaper {
    store: Arc<dyn RecordStore>,
    interval: Duration,
}

impl ExpiredRecordReaper {
    pub fn new(store: Arc<dyn RecordStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run until the task is aborted
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use dedup_consumer::store::{ExpiredRecordReaper, InMemoryRecordStore};
    ///
    /// # async fn example() {
    /// let reaper = ExpiredRecordReaper::new(
    ///     Arc::new(InMemoryRecordStore::new()),
    ///     Duration::from_secs(3600),
    /// );
    /// let handle = tokio::spawn(reaper.run());
    /// handle.abort();
    /// # }
    /// ```
    pub async fn run(self) {
        tracing::info!(
            store = self.store.name(),
            interval_secs = self.interval.as_secs(),
            "Starting expired dedup record reaper"
        );

        let mut interval = time::interval(self.interval);

        loop {
            interval.tick().await;
            self.reap_once().await;
        }
    }

    /// One sweep; errors are logged and the next tick tries again
    pub async fn reap_once(&self) -> u64 {
        match self.store.purge_expired().await {
            Ok(0) => {
                tracing::debug!("No expired dedup records to purge");
                0
            }
            Ok(deleted_count) => {
                tracing::info!(deleted_count, "Purged expired dedup records");
                DEDUP_EXPIRED_PURGED_TOTAL.inc_by(deleted_count);
                deleted_count
            }
            Err(e) => {
                DEDUP_STORE_ERRORS_TOTAL
                    .with_label_values(&["purge_expired", e.error_code()])
                    .inc();
                tracing::error!(error = %e, "Failed to purge expired dedup records");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dedup_error::{StoreError, StoreResult};
    use dedup_types::{DedupKey, StoredStatus};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingStore {
        purges: AtomicU64,
        fail: bool,
    }

    impl CountingStore {
        fn new(fail: bool) -> Self {
            Self {
                purges: AtomicU64::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn set_consuming_if_absent(&self, _key: &DedupKey, _ttl: Duration) -> StoreResult<bool> {
            Ok(true)
        }

        async fn get(&self, _key: &DedupKey) -> StoreResult<Option<StoredStatus>> {
            Ok(None)
        }

        async fn mark_consumed(&self, _key: &DedupKey, _ttl: Duration) -> StoreResult<()> {
            Ok(())
        }

        async fn delete(&self, _key: &DedupKey) -> StoreResult<()> {
            Ok(())
        }

        async fn purge_expired(&self) -> StoreResult<u64> {
            self.purges.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            Ok(3)
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_runs_every_interval() {
        let store = Arc::new(CountingStore::new(false));
        let reaper = ExpiredRecordReaper::new(store.clone(), Duration::from_millis(100));

        let handle = tokio::spawn(reaper.run());

        // First tick fires immediately, then once per interval
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        handle.abort();

        assert!(store.purges.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_reap_once_survives_store_error() {
        let store = Arc::new(CountingStore::new(true));
        let reaper = ExpiredRecordReaper::new(store.clone(), Duration::from_secs(1));

        assert_eq!(reaper.reap_once().await, 0);
        assert_eq!(reaper.reap_once().await, 0);
        assert_eq!(store.purges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reap_once_reports_count() {
        let reaper = ExpiredRecordReaper::new(Arc::new(CountingStore::new(false)), Duration::from_secs(1));
        assert_eq!(reaper.reap_once().await, 3);
    }
}
