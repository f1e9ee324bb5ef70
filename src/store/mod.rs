// ============================================================================
// Record Store
// ============================================================================
//
// Storage interface for dedup records. The engine coordinates workers only
// through `set_consuming_if_absent`, so every driver must make that a single
// atomic operation on the backing store.
//
// Implementations:
// - Redis (SET NX PX, native expiry)
// - PostgreSQL (unique key + expire_time column, reaped in the background)
// - In-memory (single process, tests)
//
// ============================================================================

mod memory;
mod postgres;
mod reaper;
mod redis;

pub use memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;
pub use reaper::ExpiredRecordReaper;
pub use redis::RedisRecordStore;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dedup_config::{Config, StoreBackend, MAX_RECORD_TTL};
use dedup_error::StoreResult;
use dedup_types::{DedupKey, StoredStatus};

/// Storage interface for dedup records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a CONSUMING record expiring after `processing_ttl`, only if no
    /// live record exists for `key`. Returns true iff the record was created.
    async fn set_consuming_if_absent(
        &self,
        key: &DedupKey,
        processing_ttl: Duration,
    ) -> StoreResult<bool>;

    /// Status of the live record for `key`, if any
    async fn get(&self, key: &DedupKey) -> StoreResult<Option<StoredStatus>>;

    /// Overwrite the record with CONSUMED, expiring after `retention_ttl`
    async fn mark_consumed(&self, key: &DedupKey, retention_ttl: Duration) -> StoreResult<()>;

    /// Remove the record; removing a missing record is not an error
    async fn delete(&self, key: &DedupKey) -> StoreResult<()>;

    /// Physically remove expired records, returning how many were removed.
    /// Stores with native expiry have nothing to do.
    async fn purge_expired(&self) -> StoreResult<u64> {
        Ok(0)
    }

    /// Short driver name for logs
    fn name(&self) -> &'static str;
}

/// Build the record store selected by `DEDUP_STORE`
pub async fn connect(config: &Config) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.store {
        StoreBackend::Redis => {
            tracing::info!(url = %config.redis_url_safe(), "Connecting dedup store to Redis");
            let client = dedup_redis::RedisClient::connect(&config.redis.url)
                .await
                .context("Failed to connect to Redis")?;
            Arc::new(RedisRecordStore::new(client, config.redis.key_prefix.clone()))
        }
        StoreBackend::Postgres => {
            tracing::info!("Connecting dedup store to PostgreSQL");
            let pool = dedup_db::connect(&config.db).await?;
            Arc::new(PostgresRecordStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory dedup store; records are not shared between processes");
            Arc::new(InMemoryRecordStore::new())
        }
    };

    tracing::info!(store = store.name(), "Dedup record store ready");
    Ok(store)
}

/// Clamp a record TTL to [`MAX_RECORD_TTL`]
pub(crate) fn capped_ttl(ttl: Duration) -> Duration {
    ttl.min(MAX_RECORD_TTL)
}

/// Duration as whole milliseconds, at least 1 so a sub-millisecond TTL never
/// turns into "no expiry"
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(capped_ttl(ttl).as_millis())
        .unwrap_or(u64::MAX)
        .max(1)
}
