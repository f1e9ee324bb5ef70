// ============================================================================
// Worker Configuration
// ============================================================================

use super::constants::DEFAULT_REAP_INTERVAL_SECS;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// How often expired dedup records are physically removed (stores without native TTL)
    pub reap_interval_secs: u64,
}

impl WorkerConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            reap_interval_secs: std::env::var("DEDUP_REAP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REAP_INTERVAL_SECS),
        }
    }
}
