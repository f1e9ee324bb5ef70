//! Prometheus metrics for the dedup consumer
//!
//! Provides centralized metrics collection for monitoring:
//! - Dedup decisions (execute / defer / already done)
//! - Duplicates suppressed, per topic
//! - Degradation (store outages) and store anomalies
//! - Cleanup failures after handler completion
//! - Batch redelivery boundaries and handler latency

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, IntGaugeVec, TextEncoder, opts,
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
};

// ============================================================================
// Decision Metrics
// ============================================================================

/// Dedup decisions by kind: execute, bypass, defer, already_done
pub static DEDUP_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("dedup_decisions_total", "Dedup decisions taken, by decision"),
        &["decision"]
    )
    .expect("Failed to register DEDUP_DECISIONS_TOTAL metric")
});

/// Redeliveries recognised as already consumed (handler not invoked)
pub static DEDUP_DUPLICATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "dedup_duplicates_total",
            "Messages acknowledged without execution because they were already consumed"
        ),
        &["topic"]
    )
    .expect("Failed to register DEDUP_DUPLICATES_TOTAL metric")
});

/// Messages deferred because another attempt is still consuming them
pub static DEDUP_DEFERRED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "dedup_deferred_total",
            "Messages deferred for redelivery because the same key is still consuming"
        ),
        &["topic"]
    )
    .expect("Failed to register DEDUP_DEFERRED_TOTAL metric")
});

// ============================================================================
// Degradation & Store Health Metrics
// ============================================================================

/// Messages executed without dedup while the store was degraded
pub static DEDUP_DEGRADED_BYPASS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "dedup_degraded_bypass_total",
        "Messages executed without dedup because the record store is degraded"
    ))
    .expect("Failed to register DEDUP_DEGRADED_BYPASS_TOTAL metric")
});

/// Degradation state per application (0 = healthy, 1 = degraded)
pub static DEDUP_DEGRADED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        opts!(
            "dedup_degraded",
            "Whether dedup is currently bypassed due to record store failures"
        ),
        &["application"]
    )
    .expect("Failed to register DEDUP_DEGRADED metric")
});

/// Store errors by operation and error code
pub static DEDUP_STORE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("dedup_store_errors_total", "Record store errors"),
        &["operation", "code"]
    )
    .expect("Failed to register DEDUP_STORE_ERRORS_TOTAL metric")
});

/// Unexpected store reads (record vanished or unknown status) that fell back to execute
pub static DEDUP_STORE_ANOMALIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "dedup_store_anomalies_total",
        "Store reads that returned neither CONSUMING nor CONSUMED after a failed set-if-absent"
    ))
    .expect("Failed to register DEDUP_STORE_ANOMALIES_TOTAL metric")
});

/// Failed mark_consumed / delete calls after the handler finished
pub static DEDUP_CLEANUP_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "dedup_cleanup_failures_total",
            "Record updates that failed after the handler completed"
        ),
        &["operation"]
    )
    .expect("Failed to register DEDUP_CLEANUP_FAILURES_TOTAL metric")
});

/// Expired records physically removed by the reaper
pub static DEDUP_EXPIRED_PURGED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "dedup_expired_purged_total",
        "Expired dedup records removed by the background reaper"
    ))
    .expect("Failed to register DEDUP_EXPIRED_PURGED_TOTAL metric")
});

// ============================================================================
// Batch & Handler Metrics
// ============================================================================

/// Messages committed by the batch coordinator
pub static BATCH_MESSAGES_COMMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "batch_messages_committed_total",
        "Messages committed (acknowledged) by the batch coordinator"
    ))
    .expect("Failed to register BATCH_MESSAGES_COMMITTED_TOTAL metric")
});

/// Messages left for redelivery by the batch coordinator
pub static BATCH_MESSAGES_REDELIVERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "batch_messages_redelivered_total",
        "Messages left for transport redelivery after a failure in their batch"
    ))
    .expect("Failed to register BATCH_MESSAGES_REDELIVERED_TOTAL metric")
});

/// Handler execution time
pub static HANDLER_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "dedup_handler_duration_seconds",
        "Time spent inside the user handler",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HANDLER_DURATION_SECONDS metric")
});

/// Render every registered metric in the Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        // Just ensure metrics can be accessed without panicking
        DEDUP_DECISIONS_TOTAL.with_label_values(&["execute"]).inc();
        DEDUP_DUPLICATES_TOTAL.with_label_values(&["orders"]).inc();
        DEDUP_DEFERRED_TOTAL.with_label_values(&["orders"]).inc();
        DEDUP_DEGRADED_BYPASS_TOTAL.inc();
        DEDUP_DEGRADED.with_label_values(&["app"]).set(0);
        DEDUP_STORE_ERRORS_TOTAL
            .with_label_values(&["set_consuming_if_absent", "REDIS_ERROR"])
            .inc();
        DEDUP_STORE_ANOMALIES_TOTAL.inc();
        DEDUP_CLEANUP_FAILURES_TOTAL.with_label_values(&["delete"]).inc();
        DEDUP_EXPIRED_PURGED_TOTAL.inc_by(3);
        BATCH_MESSAGES_COMMITTED_TOTAL.inc();
        BATCH_MESSAGES_REDELIVERED_TOTAL.inc();
        HANDLER_DURATION_SECONDS.observe(0.01);
    }

    #[test]
    fn test_gather_contains_registered_metric() {
        DEDUP_STORE_ANOMALIES_TOTAL.inc();
        let text = gather_metrics().unwrap();
        assert!(text.contains("dedup_store_anomalies_total"));
    }
}
