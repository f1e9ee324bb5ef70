// ============================================================================
// Batch Coordinator
// ============================================================================
//
// Runs an ordered batch through the consume strategy, one message at a time.
// The first message that is not a success stops the batch: it and everything
// after it are left for the transport to redeliver, everything before it is
// committed.
//
// The batch itself is always reported as handled. Redelivery is expressed only
// through the boundary, so a failure at index 0 redelivers the whole batch
// instead of dropping it.
//
// ============================================================================

use dedup_metrics::{BATCH_MESSAGES_COMMITTED_TOTAL, BATCH_MESSAGES_REDELIVERED_TOTAL};
use dedup_types::{ConsumeStatus, Message};

use crate::handler::MessageHandler;
use crate::strategy::ConsumeStrategy;

/// Commit boundary of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub total: usize,
    /// Index of the first message to redeliver; `None` when all succeeded
    pub redeliver_from: Option<usize>,
}

impl BatchOutcome {
    /// Last committed position, `-1` when nothing is committed
    pub fn ack_index(&self) -> i64 {
        self.committed() as i64 - 1
    }

    /// Number of leading messages to commit
    pub fn committed(&self) -> usize {
        self.redeliver_from.unwrap_or(self.total)
    }

    pub fn redelivered(&self) -> usize {
        self.total - self.committed()
    }

    pub fn is_fully_committed(&self) -> bool {
        self.redeliver_from.is_none()
    }

    /// What the batch reports to the transport
    pub fn status(&self) -> ConsumeStatus {
        ConsumeStatus::Success
    }
}

pub struct BatchCoordinator {
    strategy: ConsumeStrategy,
}

impl BatchCoordinator {
    pub fn new(strategy: ConsumeStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &ConsumeStrategy {
        &self.strategy
    }

    pub async fn consume_batch(
        &self,
        messages: &[Message],
        handler: &dyn MessageHandler,
    ) -> BatchOutcome {
        let total = messages.len();
        let mut redeliver_from = None;

        for (index, message) in messages.iter().enumerate() {
            let report = self.strategy.invoke(message, handler).await;
            if !report.is_success() {
                tracing::warn!(
                    index,
                    topic = %message.topic,
                    delivery_id = %message.delivery_id(),
                    decision = %report.decision,
                    outcome = report.outcome.as_str(),
                    "Message not consumed, stopping batch"
                );
                redeliver_from = Some(index);
                break;
            }
        }

        let outcome = BatchOutcome {
            total,
            redeliver_from,
        };

        BATCH_MESSAGES_COMMITTED_TOTAL.inc_by(outcome.committed() as u64);
        BATCH_MESSAGES_REDELIVERED_TOTAL.inc_by(outcome.redelivered() as u64);

        if total > 0 {
            tracing::info!(
                total,
                committed = outcome.committed(),
                redelivered = outcome.redelivered(),
                ack_index = outcome.ack_index(),
                "Batch consumed"
            );
        }

        outcome
    }
}
