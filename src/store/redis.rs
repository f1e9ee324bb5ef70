use std::time::Duration;

use async_trait::async_trait;
use dedup_error::StoreResult;
use dedup_redis::RedisClient;
use dedup_types::{DedupKey, RecordStatus, StoredStatus};

use super::{ttl_millis, RecordStore};

/// Redis-backed record store
///
/// Keys: `<prefix>:<application>:<topic>[:<tag>]:<fingerprint>`, values are
/// the status string, expiry is the key's own PX.
#[derive(Clone)]
pub struct RedisRecordStore {
    client: RedisClient,
    key_prefix: String,
}

impl RedisRecordStore {
    pub fn new(client: RedisClient, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn redis_key(&self, key: &DedupKey) -> String {
        record_key(&self.key_prefix, key)
    }
}

fn record_key(prefix: &str, key: &DedupKey) -> String {
    format!("{}:{}", prefix, key)
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn set_consuming_if_absent(
        &self,
        key: &DedupKey,
        processing_ttl: Duration,
    ) -> StoreResult<bool> {
        let mut conn = self.client.clone();
        let created = conn
            .set_nx_px(
                &self.redis_key(key),
                RecordStatus::Consuming.as_str(),
                ttl_millis(processing_ttl),
            )
            .await?;
        Ok(created)
    }

    async fn get(&self, key: &DedupKey) -> StoreResult<Option<StoredStatus>> {
        let mut conn = self.client.clone();
        let raw: Option<String> = conn.get(&self.redis_key(key)).await?;
        Ok(raw.map(|value| StoredStatus::from_raw(&value)))
    }

    async fn mark_consumed(&self, key: &DedupKey, retention_ttl: Duration) -> StoreResult<()> {
        let mut conn = self.client.clone();
        conn.set_px(
            &self.redis_key(key),
            RecordStatus::Consumed.as_str(),
            ttl_millis(retention_ttl),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &DedupKey) -> StoreResult<()> {
        let mut conn = self.client.clone();
        conn.del(&self.redis_key(key)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
