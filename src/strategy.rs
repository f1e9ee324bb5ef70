// ============================================================================
// Consume Strategy
// ============================================================================
//
// Chosen once from config: PassThrough runs the handler on every delivery,
// Dedup routes each delivery through the decision engine.
//
// ============================================================================

use std::sync::Arc;

use anyhow::Result;
use dedup_config::DedupConfig;
use dedup_types::Message;

use crate::engine::{BypassReason, ConsumeReport, Decision, DedupEngine, ExecuteMode};
use crate::handler::{invoke, MessageHandler};
use crate::store::RecordStore;

/// How each message of a batch is consumed, fixed at construction
pub enum ConsumeStrategy {
    /// Run the handler on every delivery
    PassThrough,
    /// Run the handler through the dedup engine
    Dedup(DedupEngine),
}

impl ConsumeStrategy {
    /// Dedup when the config enables it, pass-through otherwise
    pub fn from_config(config: &DedupConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        config.validate()?;

        if !config.dedup_enabled {
            tracing::info!(
                application = %config.application_name,
                "Dedup disabled, consuming every delivery"
            );
            return Ok(ConsumeStrategy::PassThrough);
        }

        tracing::info!(
            application = %config.application_name,
            store = store.name(),
            processing_ttl_ms = config.processing_ttl.as_millis() as u64,
            retention_ttl_secs = config.retention_ttl.as_secs(),
            "Dedup enabled"
        );
        Ok(ConsumeStrategy::Dedup(DedupEngine::new(config, store)))
    }

    pub fn pass_through() -> Self {
        ConsumeStrategy::PassThrough
    }

    pub fn dedup(engine: DedupEngine) -> Self {
        ConsumeStrategy::Dedup(engine)
    }

    pub fn is_dedup(&self) -> bool {
        matches!(self, ConsumeStrategy::Dedup(_))
    }

    pub async fn invoke(&self, message: &Message, handler: &dyn MessageHandler) -> ConsumeReport {
        match self {
            ConsumeStrategy::PassThrough => ConsumeReport {
                decision: Decision::Execute(ExecuteMode::Unrecorded(BypassReason::Disabled)),
                outcome: invoke(handler, message).await,
            },
            ConsumeStrategy::Dedup(engine) => engine.consume(message, handler).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::store::InMemoryRecordStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_disabled_config_passes_through() {
        let store = Arc::new(InMemoryRecordStore::new());
        let strategy =
            ConsumeStrategy::from_config(&DedupConfig::disabled("app"), store.clone()).unwrap();
        assert!(!strategy.is_dedup());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = handler_fn(move |_msg: &Message| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { true }
        });

        let message = Message::new("T", None, "m1", Vec::new());
        strategy.invoke(&message, &handler).await;
        let report = strategy.invoke(&message, &handler).await;

        assert_eq!(
            report.decision,
            Decision::Execute(ExecuteMode::Unrecorded(BypassReason::Disabled))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_enabled_config_builds_engine() {
        let strategy = ConsumeStrategy::from_config(
            &DedupConfig::enabled("app"),
            Arc::new(InMemoryRecordStore::new()),
        )
        .unwrap();
        assert!(strategy.is_dedup());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result =
            ConsumeStrategy::from_config(&DedupConfig::enabled(""), Arc::new(InMemoryRecordStore::new()));
        assert!(result.is_err());
    }
}
