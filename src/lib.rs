//! # Dedup Consumer
//!
//! Idempotent consumption on top of at-least-once message delivery.
//!
//! A [`DedupEngine`] keeps one record per logical unit of work in a
//! [`RecordStore`] so that redeliveries of an already consumed message are
//! acknowledged without running the handler again. A [`BatchCoordinator`]
//! runs ordered batches through the engine and reports how far the transport
//! may commit.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dedup_consumer::{
//!     handler_fn, BatchCoordinator, ConsumeStrategy, DedupConfig, InMemoryRecordStore, Message,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let strategy = ConsumeStrategy::from_config(
//!     &DedupConfig::enabled("billing"),
//!     Arc::new(InMemoryRecordStore::new()),
//! )?;
//! let coordinator = BatchCoordinator::new(strategy);
//!
//! let handler = handler_fn(|msg: &Message| {
//!     let body = msg.body_str();
//!     async move { !body.is_empty() }
//! });
//!
//! let batch = vec![Message::new("orders", None, "m1", b"order-42".to_vec())];
//! let outcome = coordinator.consume_batch(&batch, &handler).await;
//! assert_eq!(outcome.ack_index(), 0);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod degradation;
pub mod engine;
pub mod handler;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod store;
pub mod strategy;

pub use batch::{BatchCoordinator, BatchOutcome};
pub use degradation::{Admission, DegradationGuard, DegradationState};
pub use engine::{
    delivery_id_fingerprint, BypassReason, ConsumeReport, Decision, DedupEngine, ExecuteMode,
    FingerprintFn,
};
pub use handler::{handler_fn, HandlerOutcome, MessageHandler};
pub use store::{
    ExpiredRecordReaper, InMemoryRecordStore, PostgresRecordStore, RecordStore, RedisRecordStore,
};
pub use strategy::ConsumeStrategy;

pub use dedup_config::{Config, DedupConfig, StoreBackend};
pub use dedup_error::{StoreError, StoreResult};
pub use dedup_types::{ConsumeStatus, DedupKey, Message, RecordStatus, StoredStatus};
