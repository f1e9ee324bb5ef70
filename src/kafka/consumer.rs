use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dedup_config::KafkaConfig;
use dedup_types::Message;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message as KafkaMessage};
use rdkafka::{Offset, TopicPartitionList};
use tracing::{error, info, warn};

use crate::batch::{BatchCoordinator, BatchOutcome};
use crate::handler::MessageHandler;

/// Header carrying the routing tag
pub const TAG_HEADER: &str = "tag";
/// Header carrying the producer-assigned unique id
pub const UNIQUE_ID_HEADER: &str = "unique-id";

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);
const RECV_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Build a [`Message`] from the parts of a Kafka record.
///
/// Kafka has no message id of its own, so `partition-offset` stands in for it;
/// a redelivered record keeps its offset and therefore its id.
pub fn message_from_record(
    topic: &str,
    partition: i32,
    offset: i64,
    headers: &[(&str, Option<&[u8]>)],
    payload: Option<&[u8]>,
) -> Message {
    let header = |name: &str| {
        headers
            .iter()
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| *value)
            .map(|value| String::from_utf8_lossy(value).into_owned())
    };

    let tag = header(TAG_HEADER);
    let mut message = Message::new(
        topic,
        tag.as_deref(),
        format!("{}-{}", partition, offset),
        payload.unwrap_or_default().to_vec(),
    );
    if let Some(unique_id) = header(UNIQUE_ID_HEADER) {
        message = message.with_unique_id(unique_id);
    }
    message
}

/// Where to commit and where to seek after a partition batch.
///
/// Returns `(commit_offset, seek_offset)`: the offset to commit (next record
/// to read) when anything was committed, and the offset of the first record
/// to redeliver when the batch stopped early.
pub fn partition_offsets(offsets: &[i64], outcome: &BatchOutcome) -> (Option<i64>, Option<i64>) {
    let commit = match outcome.committed() {
        0 => None,
        n => offsets.get(n - 1).map(|last| last + 1),
    };
    let seek = outcome
        .redeliver_from
        .and_then(|index| offsets.get(index).copied());
    (commit, seek)
}

fn read_record(record: &BorrowedMessage<'_>) -> ((String, i32), i64, Message) {
    let headers: Vec<(&str, Option<&[u8]>)> = record
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| (header.key, header.value))
                .collect()
        })
        .unwrap_or_default();

    let message = message_from_record(
        record.topic(),
        record.partition(),
        record.offset(),
        &headers,
        record.payload(),
    );
    (
        (record.topic().to_string(), record.partition()),
        record.offset(),
        message,
    )
}

#[derive(Default)]
struct PartitionBatch {
    offsets: Vec<i64>,
    messages: Vec<Message>,
}

/// Kafka consumer feeding partition batches through a [`BatchCoordinator`]
///
/// This consumer is configured for:
/// - Manual offset commits, only up to each batch's ack boundary
/// - Seeking back to the first record that must be redelivered
/// - Consumer group coordination between workers
pub struct DedupBatchConsumer {
    consumer: StreamConsumer,
    coordinator: Arc<BatchCoordinator>,
    config: KafkaConfig,
}

impl DedupBatchConsumer {
    pub fn new(config: KafkaConfig, coordinator: Arc<BatchCoordinator>) -> Result<Self> {
        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            consumer_group = %config.consumer_group,
            batch_size = config.batch_size,
            "Initializing Kafka batch consumer"
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("fetch.min.bytes", "1")
            .set("fetch.wait.max.ms", "500")
            .set("max.partition.fetch.bytes", "1048576")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "3000")
            .set("max.poll.interval.ms", "300000")
            .create()
            .context("Failed to create Kafka consumer")?;

        consumer
            .subscribe(&[&config.topic])
            .context("Failed to subscribe to Kafka topic")?;

        Ok(Self {
            consumer,
            coordinator,
            config,
        })
    }

    /// Consume forever; stop by dropping the future
    pub async fn run(&self, handler: &dyn MessageHandler) -> Result<()> {
        loop {
            let batch = self.next_batch().await;
            self.process(batch, handler).await?;
        }
    }

    /// Wait for one record, then keep collecting until the batch is full or
    /// the batch timeout passes
    async fn next_batch(&self) -> BTreeMap<(String, i32), PartitionBatch> {
        let mut batches: BTreeMap<(String, i32), PartitionBatch> = BTreeMap::new();
        let mut collected = 0;

        let (key, offset, message) = self.recv().await;
        let batch = batches.entry(key).or_default();
        batch.offsets.push(offset);
        batch.messages.push(message);
        collected += 1;

        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.config.batch_timeout_ms);
        while collected < self.config.batch_size {
            match tokio::time::timeout_at(deadline, self.recv()).await {
                Ok((key, offset, message)) => {
                    let batch = batches.entry(key).or_default();
                    batch.offsets.push(offset);
                    batch.messages.push(message);
                    collected += 1;
                }
                Err(_) => break,
            }
        }

        batches
    }

    async fn recv(&self) -> ((String, i32), i64, Message) {
        loop {
            let error = match self.consumer.recv().await {
                Ok(record) => return read_record(&record),
                Err(e) => e,
            };
            error!(error = %error, "Kafka consumer error");
            tokio::time::sleep(RECV_ERROR_BACKOFF).await;
        }
    }

    async fn process(
        &self,
        batches: BTreeMap<(String, i32), PartitionBatch>,
        handler: &dyn MessageHandler,
    ) -> Result<()> {
        let mut redelivering = false;

        for ((topic, partition), batch) in batches {
            let outcome = self.coordinator.consume_batch(&batch.messages, handler).await;
            let (commit, seek) = partition_offsets(&batch.offsets, &outcome);

            if let Some(next_offset) = commit {
                self.commit(&topic, partition, next_offset)?;
            }

            if let Some(offset) = seek {
                warn!(
                    topic = %topic,
                    partition,
                    offset,
                    "Rewinding partition for redelivery"
                );
                self.consumer
                    .seek(&topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
                    .context("Failed to seek partition for redelivery")?;
                redelivering = true;
            }
        }

        if redelivering {
            tokio::time::sleep(Duration::from_millis(self.config.redelivery_backoff_ms)).await;
        }
        Ok(())
    }

    fn commit(&self, topic: &str, partition: i32, next_offset: i64) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(topic, partition, Offset::Offset(next_offset))
            .context("Failed to build offset list")?;
        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .context("Failed to commit offset")?;
        Ok(())
    }
}
