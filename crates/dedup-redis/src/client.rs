//! Redis client implementation with connection management

use crate::Result;
use redis::{aio::ConnectionManager, AsyncCommands};

/// Redis client with automatic reconnection
///
/// Cloning is cheap: clones share the underlying multiplexed connection.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Connect to Redis server
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// GET - Get value by key
    pub async fn get<T: redis::FromRedisValue>(&mut self, key: &str) -> Result<Option<T>> {
        self.conn.get(key).await
    }

    /// SET key value PX ms NX - set only if the key does not exist
    ///
    /// Returns true if the key was set
    pub async fn set_nx_px(&mut self, key: &str, value: &str, ttl_ms: u64) -> Result<bool> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .arg("NX")
            .query_async(&mut self.conn)
            .await?;
        Ok(reply.is_some())
    }

    /// SET key value PX ms - unconditional set with millisecond expiry
    pub async fn set_px(&mut self, key: &str, value: &str, ttl_ms: u64) -> Result<()> {
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut self.conn)
            .await?;
        Ok(())
    }

    /// DEL - Delete a key, returns number of keys removed
    pub async fn del(&mut self, key: &str) -> Result<i64> {
        self.conn.del(key).await
    }

    /// PTTL - Remaining time to live in milliseconds (-2 missing, -1 no expiry)
    pub async fn pttl(&mut self, key: &str) -> Result<i64> {
        self.conn.pttl(key).await
    }
}
