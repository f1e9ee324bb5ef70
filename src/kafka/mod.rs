// ============================================================================
// Kafka Transport
// ============================================================================
//
// Records are gathered into per-partition batches, run through the batch
// coordinator, and committed only up to each batch's ack boundary. The rest
// of the partition is rewound so Kafka delivers it again.
//
// ============================================================================

pub mod consumer;

pub use consumer::{message_from_record, partition_offsets, DedupBatchConsumer};
