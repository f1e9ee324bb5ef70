// ============================================================================
// Configuration Constants
// ============================================================================

use std::time::Duration;

// In-flight window for a CONSUMING record: duplicates arriving inside it are
// deferred, after it the record no longer blocks execution
pub(crate) const DEFAULT_PROCESSING_TTL: Duration = Duration::from_secs(60);

// How long a CONSUMED record suppresses re-execution
pub(crate) const DEFAULT_RETENTION_TTL: Duration = Duration::from_secs(24 * SECONDS_PER_HOUR);

// Upper bound for any record TTL; longer values are rejected by validation
// and clamped by the stores
pub const MAX_RECORD_TTL: Duration = Duration::from_secs(3650 * 24 * SECONDS_PER_HOUR);

// Bypassed attempts between two store probes while degraded
pub(crate) const DEFAULT_DEGRADATION_PROBE_INTERVAL: u64 = 10_000;

pub(crate) const DEFAULT_REDIS_KEY_PREFIX: &str = "MSGDEDUP";
pub(crate) const DEFAULT_REAP_INTERVAL_SECS: u64 = 3600;
pub(crate) const DEFAULT_BATCH_SIZE: usize = 32;
pub(crate) const DEFAULT_BATCH_TIMEOUT_MS: u64 = 500;
pub(crate) const DEFAULT_REDELIVERY_BACKOFF_MS: u64 = 1000;

// Time conversion constants
pub const SECONDS_PER_MINUTE: u64 = 60;
pub const SECONDS_PER_HOUR: u64 = 3600;
