// ============================================================================
// Kafka Configuration
// ============================================================================

use super::constants::*;

/// Transport settings for the batch consumer
#[derive(Clone, Debug)]
pub struct KafkaConfig {
    /// Comma-separated list of Kafka brokers (e.g., "kafka1:9092,kafka2:9092")
    pub brokers: String,
    pub topic: String,
    pub consumer_group: String,
    /// Maximum messages handed to the coordinator at once
    pub batch_size: usize,
    /// How long to wait for a batch to fill before processing what we have
    pub batch_timeout_ms: u64,
    /// Pause after a partially failed batch before re-reading the redelivered part
    pub redelivery_backoff_ms: u64,
}

impl KafkaConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            brokers: std::env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            topic: std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "dedup-messages".to_string()),
            consumer_group: std::env::var("KAFKA_CONSUMER_GROUP")
                .unwrap_or_else(|_| "dedup-consumers".to_string()),
            batch_size: std::env::var("KAFKA_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            batch_timeout_ms: std::env::var("KAFKA_BATCH_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_BATCH_TIMEOUT_MS),
            redelivery_backoff_ms: std::env::var("KAFKA_REDELIVERY_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REDELIVERY_BACKOFF_MS),
        }
    }
}
