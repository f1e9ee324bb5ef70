// ============================================================================
// Redis Configuration
// ============================================================================

use super::constants::DEFAULT_REDIS_KEY_PREFIX;

#[derive(Clone, Debug)]
pub struct RedisStoreConfig {
    pub url: String,
    /// Leading segment of every dedup key: "{prefix}:{app}:{topic}[:{tag}]:{fingerprint}"
    pub key_prefix: String,
}

impl RedisStoreConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            key_prefix: std::env::var("DEDUP_REDIS_KEY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_REDIS_KEY_PREFIX.to_string()),
        }
    }
}
