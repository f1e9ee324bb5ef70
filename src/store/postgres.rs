use std::time::Duration;

use async_trait::async_trait;
use dedup_error::StoreResult;
use dedup_types::{DedupKey, RecordStatus, StoredStatus};
use sqlx::PgPool;

use super::{capped_ttl, RecordStore};

/// PostgreSQL-backed record store over the `message_dedup` table
///
/// Expiry is a column, not a TTL: reads ignore expired rows, a conflicting
/// insert reclaims the expired row for its own key, and
/// [`purge_expired`](RecordStore::purge_expired) sweeps the rest.
/// All timestamps come from the database clock.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns true if a row was inserted
    async fn insert_consuming(&self, key: &DedupKey, processing_ttl: Duration) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_dedup
                (application_name, topic, tag, msg_uniq_key, status, expire_time)
            VALUES ($1, $2, $3, $4, $5, NOW() + make_interval(secs => $6))
            ON CONFLICT (application_name, topic, tag, msg_uniq_key) DO NOTHING
            "#,
        )
        .bind(&key.application)
        .bind(&key.topic)
        .bind(&key.tag)
        .bind(&key.fingerprint)
        .bind(RecordStatus::Consuming.as_str())
        .bind(capped_ttl(processing_ttl).as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove this key's row only if it has expired
    async fn reclaim_expired(&self, key: &DedupKey) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM message_dedup
            WHERE application_name = $1 AND topic = $2 AND tag = $3 AND msg_uniq_key = $4
              AND expire_time <= NOW()
            "#,
        )
        .bind(&key.application)
        .bind(&key.topic)
        .bind(&key.tag)
        .bind(&key.fingerprint)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn set_consuming_if_absent(
        &self,
        key: &DedupKey,
        processing_ttl: Duration,
    ) -> StoreResult<bool> {
        if self.insert_consuming(key, processing_ttl).await? {
            return Ok(true);
        }

        // A conflicting row may only be a leftover past its expire_time.
        // Retry once; losing the retry means another worker got there first.
        if !self.reclaim_expired(key).await? {
            return Ok(false);
        }

        tracing::debug!(dedup_key = %key, "Reclaimed expired dedup row");
        self.insert_consuming(key, processing_ttl).await
    }

    async fn get(&self, key: &DedupKey) -> StoreResult<Option<StoredStatus>> {
        let status = sqlx::query_scalar::<_, String>(
            r#"
            SELECT status FROM message_dedup
            WHERE application_name = $1 AND topic = $2 AND tag = $3 AND msg_uniq_key = $4
              AND expire_time > NOW()
            "#,
        )
        .bind(&key.application)
        .bind(&key.topic)
        .bind(&key.tag)
        .bind(&key.fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(status.map(|raw| StoredStatus::from_raw(&raw)))
    }

    async fn mark_consumed(&self, key: &DedupKey, retention_ttl: Duration) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE message_dedup
            SET status = $5, expire_time = NOW() + make_interval(secs => $6)
            WHERE application_name = $1 AND topic = $2 AND tag = $3 AND msg_uniq_key = $4
            "#,
        )
        .bind(&key.application)
        .bind(&key.topic)
        .bind(&key.tag)
        .bind(&key.fingerprint)
        .bind(RecordStatus::Consumed.as_str())
        .bind(capped_ttl(retention_ttl).as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &DedupKey) -> StoreResult<()> {
        sqlx::query(
            r#"
            DELETE FROM message_dedup
            WHERE application_name = $1 AND topic = $2 AND tag = $3 AND msg_uniq_key = $4
            "#,
        )
        .bind(&key.application)
        .bind(&key.topic)
        .bind(&key.tag)
        .bind(&key.fingerprint)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM message_dedup
            WHERE expire_time < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
