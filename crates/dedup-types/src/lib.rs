// ============================================================================
// Dedup Types - Core Data Types
// ============================================================================
//
// Data structures shared by every part of the dedup consumer. This crate has
// NO dependencies on stores, transports or runtime.
//
// Contents:
// - Message (what the transport hands us)
// - DedupKey (what identifies one logical unit of work)
// - RecordStatus / StoredStatus (what the record store keeps per key)
// - ConsumeStatus (what goes back to the transport)
//
// ============================================================================

pub mod key;
pub mod message;
pub mod record;
pub mod status;

// Re-exports for convenience
pub use key::DedupKey;
pub use message::Message;
pub use record::{RecordStatus, StoredStatus};
pub use status::ConsumeStatus;
