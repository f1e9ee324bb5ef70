//! # Dedup Redis
//!
//! Low-level Redis client used by the Redis record store.
//!
//! ## Design Principles
//!
//! - **No business logic** - knows nothing about dedup records or statuses
//! - **No dependencies** on other dedup-* crates
//! - **Millisecond expiry** - TTLs are passed through as PX so sub-second
//!   processing windows survive the round trip
//!
//! ## Example
//!
//! ```rust,no_run
//! use dedup_redis::RedisClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RedisClient::connect("redis://localhost:6379").await?;
//!
//!     // Only the first caller wins
//!     let acquired = client.set_nx_px("lock", "CONSUMING", 60_000).await?;
//!     assert!(acquired);
//!
//!     let value: Option<String> = client.get("lock").await?;
//!
//!     Ok(())
//! }
//! ```

mod client;

pub use client::RedisClient;

// Re-export commonly used types
pub use redis::RedisError;

/// Result type for Redis operations
pub type Result<T> = std::result::Result<T, RedisError>;
