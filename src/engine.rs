// ============================================================================
// Dedup Decision Engine
// ============================================================================
//
// Decides, per delivery, whether the handler runs:
//
//   no fingerprint            -> Execute (unrecorded)
//   store degraded            -> Execute (unrecorded)
//   set_consuming_if_absent:
//     created                 -> Execute (recorded)
//     exists, CONSUMING       -> Defer        (reported as failure)
//     exists, CONSUMED        -> AlreadyDone  (reported as success)
//     exists, absent/unknown  -> Execute (recorded, anomaly)
//   store unreachable         -> Execute (unrecorded), engine degrades
//   other store error         -> Execute (unrecorded), this message only
//
// After a recorded execution the record is marked CONSUMED on success and
// deleted on failure or fault, so a redelivery looks like a first attempt.
// Record cleanup errors are logged and never change the message outcome.
//
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dedup_config::DedupConfig;
use dedup_error::StoreError;
use dedup_metrics::{
    DEDUP_CLEANUP_FAILURES_TOTAL, DEDUP_DECISIONS_TOTAL, DEDUP_DEFERRED_TOTAL,
    DEDUP_DUPLICATES_TOTAL, DEDUP_STORE_ANOMALIES_TOTAL, DEDUP_STORE_ERRORS_TOTAL,
};
use dedup_types::{ConsumeStatus, DedupKey, Message, StoredStatus};

use crate::degradation::{Admission, DegradationGuard, DegradationState};
use crate::handler::{invoke, HandlerOutcome, MessageHandler};
use crate::store::RecordStore;

/// Computes the fingerprint part of a message's dedup key.
/// `None` or an empty string means the message cannot be deduplicated.
pub type FingerprintFn = Arc<dyn Fn(&Message) -> Option<String> + Send + Sync>;

/// The transport's delivery id
pub fn delivery_id_fingerprint() -> FingerprintFn {
    Arc::new(|message: &Message| Some(message.delivery_id().to_string()))
}

/// Why a message ran without a dedup record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// Dedup is switched off for this consumer
    Disabled,
    /// The message has no fingerprint
    NoFingerprint,
    /// The record store is unreachable
    Degraded,
    /// A store call failed for this message's key only
    StoreFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteMode {
    /// A CONSUMING record guards this execution
    Recorded,
    /// The handler runs without touching the store afterwards
    Unrecorded(BypassReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run the handler
    Execute(ExecuteMode),
    /// Another attempt is in flight; redeliver later
    Defer,
    /// Already consumed; acknowledge without running the handler
    AlreadyDone,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Execute(ExecuteMode::Recorded) => "execute",
            Decision::Execute(ExecuteMode::Unrecorded(_)) => "bypass",
            Decision::Defer => "defer",
            Decision::AlreadyDone => "already_done",
        }
    }

    pub fn invokes_handler(&self) -> bool {
        matches!(self, Decision::Execute(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one delivery
#[derive(Debug)]
pub struct ConsumeReport {
    pub decision: Decision,
    pub outcome: HandlerOutcome,
}

impl ConsumeReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn status(&self) -> ConsumeStatus {
        if self.is_success() {
            ConsumeStatus::Success
        } else {
            ConsumeStatus::ReconsumeLater
        }
    }
}

/// Dedup decision engine for one consuming application
pub struct DedupEngine {
    application_name: String,
    store: Arc<dyn RecordStore>,
    processing_ttl: Duration,
    retention_ttl: Duration,
    fingerprint: FingerprintFn,
    guard: DegradationGuard,
}

impl DedupEngine {
    pub fn new(config: &DedupConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            application_name: config.application_name.clone(),
            store,
            processing_ttl: config.processing_ttl,
            retention_ttl: config.retention_ttl,
            fingerprint: delivery_id_fingerprint(),
            guard: DegradationGuard::new(
                config.application_name.clone(),
                config.degradation_probe_interval,
            ),
        }
    }

    /// Replace the default delivery-id fingerprint, e.g. with a business key
    pub fn with_fingerprint<F>(mut self, fingerprint: F) -> Self
    where
        F: Fn(&Message) -> Option<String> + Send + Sync + 'static,
    {
        self.fingerprint = Arc::new(fingerprint);
        self
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn degradation_state(&self) -> DegradationState {
        self.guard.state().await
    }

    pub fn dedup_key(&self, message: &Message) -> DedupKey {
        DedupKey::for_message(&self.application_name, message, (self.fingerprint)(message))
    }

    /// Take the dedup decision for `message`.
    ///
    /// A recorded `Execute` leaves a CONSUMING record behind; callers that
    /// do not go through [`consume`](Self::consume) own its cleanup.
    pub async fn decide(&self, message: &Message) -> Decision {
        let key = self.dedup_key(message);
        self.decide_for_key(&key).await
    }

    async fn decide_for_key(&self, key: &DedupKey) -> Decision {
        if !key.has_fingerprint() {
            tracing::debug!(dedup_key = %key, "No fingerprint, consuming without dedup");
            return Decision::Execute(ExecuteMode::Unrecorded(BypassReason::NoFingerprint));
        }

        if self.guard.admit().await == Admission::Bypass {
            return Decision::Execute(ExecuteMode::Unrecorded(BypassReason::Degraded));
        }

        let created = match self
            .store
            .set_consuming_if_absent(key, self.processing_ttl)
            .await
        {
            Ok(created) => created,
            Err(e) => return self.degrade("set_consuming_if_absent", key, e).await,
        };
        self.guard.record_success().await;

        if created {
            tracing::debug!(dedup_key = %key, "Dedup record created, consuming");
            return Decision::Execute(ExecuteMode::Recorded);
        }

        match self.store.get(key).await {
            Ok(Some(StoredStatus::Consuming)) => Decision::Defer,
            Ok(Some(StoredStatus::Consumed)) => Decision::AlreadyDone,
            Ok(Some(StoredStatus::Unknown(raw))) => {
                DEDUP_STORE_ANOMALIES_TOTAL.inc();
                tracing::warn!(
                    dedup_key = %key,
                    status = %raw,
                    anomaly = true,
                    "Dedup record has unknown status, consuming and overwriting it"
                );
                Decision::Execute(ExecuteMode::Recorded)
            }
            Ok(None) => {
                DEDUP_STORE_ANOMALIES_TOTAL.inc();
                tracing::warn!(
                    dedup_key = %key,
                    anomaly = true,
                    "Dedup record vanished after set-if-absent refused, consuming anyway"
                );
                Decision::Execute(ExecuteMode::Recorded)
            }
            Err(e) => self.degrade("get", key, e).await,
        }
    }

    async fn degrade(&self, operation: &str, key: &DedupKey, error: StoreError) -> Decision {
        DEDUP_STORE_ERRORS_TOTAL
            .with_label_values(&[operation, error.error_code()])
            .inc();
        if error.is_connectivity() {
            tracing::debug!(dedup_key = %key, operation, "Record store call failed");
            self.guard.record_failure(&error).await;
            return Decision::Execute(ExecuteMode::Unrecorded(BypassReason::Degraded));
        }

        // Rejected for this key only; the store itself is still usable
        tracing::warn!(
            dedup_key = %key,
            operation,
            error = %error,
            "Record store rejected dedup record, consuming without dedup"
        );
        Decision::Execute(ExecuteMode::Unrecorded(BypassReason::StoreFailure))
    }

    /// Decide, run the handler if the decision allows it, and settle the
    /// dedup record
    pub async fn consume(&self, message: &Message, handler: &dyn MessageHandler) -> ConsumeReport {
        let key = self.dedup_key(message);
        let decision = self.decide_for_key(&key).await;
        DEDUP_DECISIONS_TOTAL
            .with_label_values(&[decision.as_str()])
            .inc();

        let outcome = match decision {
            Decision::Defer => {
                DEDUP_DEFERRED_TOTAL
                    .with_label_values(&[message.topic.as_str()])
                    .inc();
                tracing::warn!(
                    dedup_key = %key,
                    delivery_id = %message.delivery_id(),
                    "Message is still being consumed elsewhere, deferring"
                );
                HandlerOutcome::Failure
            }
            Decision::AlreadyDone => {
                DEDUP_DUPLICATES_TOTAL
                    .with_label_values(&[message.topic.as_str()])
                    .inc();
                tracing::warn!(
                    dedup_key = %key,
                    delivery_id = %message.delivery_id(),
                    "Message already consumed, skipping duplicate"
                );
                HandlerOutcome::Success
            }
            Decision::Execute(ExecuteMode::Unrecorded(_)) => invoke(handler, message).await,
            Decision::Execute(ExecuteMode::Recorded) => {
                let outcome = invoke(handler, message).await;
                self.settle(&key, &outcome).await;
                outcome
            }
        };

        ConsumeReport { decision, outcome }
    }

    async fn settle(&self, key: &DedupKey, outcome: &HandlerOutcome) {
        let (operation, result) = match outcome {
            HandlerOutcome::Success => (
                "mark_consumed",
                self.store.mark_consumed(key, self.retention_ttl).await,
            ),
            HandlerOutcome::Failure => ("delete", self.store.delete(key).await),
            HandlerOutcome::Fault(e) => {
                tracing::warn!(dedup_key = %key, error = %e, "Handler faulted, releasing dedup record");
                ("delete", self.store.delete(key).await)
            }
        };

        match result {
            Ok(()) => tracing::debug!(
                dedup_key = %key,
                outcome = outcome.as_str(),
                "Dedup record settled"
            ),
            Err(e) => {
                DEDUP_CLEANUP_FAILURES_TOTAL
                    .with_label_values(&[operation])
                    .inc();
                DEDUP_STORE_ERRORS_TOTAL
                    .with_label_values(&[operation, e.error_code()])
                    .inc();
                tracing::error!(
                    dedup_key = %key,
                    operation,
                    outcome = outcome.as_str(),
                    error = %e,
                    "Failed to settle dedup record"
                );
            }
        }
    }
}
