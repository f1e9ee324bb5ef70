use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use dedup_error::StoreResult;
use dedup_types::{DedupKey, RecordStatus, StoredStatus};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{capped_ttl, RecordStore};

/// Process-local record store
///
/// Expiry follows the tokio clock, so paused-time tests can step over TTLs
/// with `tokio::time::advance`.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<DedupKey, (RecordStatus, Instant)>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let records = self.records.lock().await;
        records.values().filter(|(_, expires_at)| *expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn set_consuming_if_absent(
        &self,
        key: &DedupKey,
        processing_ttl: Duration,
    ) -> StoreResult<bool> {
        let now = Instant::now();
        let mut records = self.records.lock().await;

        if let Some((_, expires_at)) = records.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }

        records.insert(key.clone(), (RecordStatus::Consuming, now + capped_ttl(processing_ttl)));
        Ok(true)
    }

    async fn get(&self, key: &DedupKey) -> StoreResult<Option<StoredStatus>> {
        let now = Instant::now();
        let records = self.records.lock().await;

        Ok(records
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(status, _)| (*status).into()))
    }

    async fn mark_consumed(&self, key: &DedupKey, retention_ttl: Duration) -> StoreResult<()> {
        let expires_at = Instant::now() + capped_ttl(retention_ttl);
        self.records
            .lock()
            .await
            .insert(key.clone(), (RecordStatus::Consumed, expires_at));
        Ok(())
    }

    async fn delete(&self, key: &DedupKey) -> StoreResult<()> {
        self.records.lock().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - records.len()) as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DedupKey {
        DedupKey::new("app", "T", "", "m1")
    }

    #[tokio::test]
    async fn test_set_if_absent_is_exclusive() {
        let store = InMemoryRecordStore::new();
        assert!(store.set_consuming_if_absent(&key(), Duration::from_secs(60)).await.unwrap());
        assert!(!store.set_consuming_if_absent(&key(), Duration::from_secs(60)).await.unwrap());
        assert_eq!(store.get(&key()).await.unwrap(), Some(StoredStatus::Consuming));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consuming_record_expires() {
        let store = InMemoryRecordStore::new();
        store.set_consuming_if_absent(&key(), Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(store.get(&key()).await.unwrap(), None);
        assert!(store.set_consuming_if_absent(&key(), Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_consumed_and_delete_are_idempotent() {
        let store = InMemoryRecordStore::new();
        store.mark_consumed(&key(), Duration::from_secs(60)).await.unwrap();
        store.mark_consumed(&key(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(&key()).await.unwrap(), Some(StoredStatus::Consumed));

        store.delete(&key()).await.unwrap();
        store.delete(&key()).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_counts_removed() {
        let store = InMemoryRecordStore::new();
        store.set_consuming_if_absent(&key(), Duration::from_secs(1)).await.unwrap();
        store
            .mark_consumed(&DedupKey::new("app", "T", "", "m2"), Duration::from_secs(600))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unbounded_ttl_is_clamped() {
        let store = InMemoryRecordStore::new();
        let key = key();

        assert!(store.set_consuming_if_absent(&key, Duration::MAX).await.unwrap());
        store.mark_consumed(&key, Duration::MAX).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(StoredStatus::Consumed));
    }
}
