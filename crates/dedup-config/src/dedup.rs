// ============================================================================
// Dedup Configuration
// ============================================================================

use super::constants::*;
use anyhow::Result;
use std::time::Duration;

/// Which record store backs the dedup engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Key-value store with native TTL and SET NX
    Redis,
    /// Relational table with an expire_time column
    Postgres,
    /// Process-local map (tests, single-instance deployments)
    Memory,
}

impl StoreBackend {
    pub(crate) fn from_env() -> Self {
        let raw = std::env::var("DEDUP_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase();

        match raw.as_str() {
            "redis" => StoreBackend::Redis,
            "postgres" | "postgresql" | "pg" => StoreBackend::Postgres,
            "memory" | "in-memory" => StoreBackend::Memory,
            _ => {
                tracing::warn!(
                    store = %raw,
                    "Unknown DEDUP_STORE, defaulting to 'memory'"
                );
                StoreBackend::Memory
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Redis => "redis",
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        }
    }
}

/// Deduplication behaviour for one consuming application
#[derive(Clone, Debug)]
pub struct DedupConfig {
    /// Dedup scope: two applications consuming the same topic never share records
    pub application_name: String,
    /// false = every message goes straight to the handler
    pub dedup_enabled: bool,
    /// Lifetime of a CONSUMING record
    pub processing_ttl: Duration,
    /// Lifetime of a CONSUMED record
    pub retention_ttl: Duration,
    /// Bypassed attempts between store probes while degraded
    pub degradation_probe_interval: u64,
}

impl DedupConfig {
    /// Dedup enabled with default TTLs
    pub fn enabled(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            dedup_enabled: true,
            processing_ttl: DEFAULT_PROCESSING_TTL,
            retention_ttl: DEFAULT_RETENTION_TTL,
            degradation_probe_interval: DEFAULT_DEGRADATION_PROBE_INTERVAL,
        }
    }

    /// Dedup disabled; messages pass straight through
    pub fn disabled(application_name: impl Into<String>) -> Self {
        Self {
            dedup_enabled: false,
            ..Self::enabled(application_name)
        }
    }

    pub fn with_processing_ttl(mut self, ttl: Duration) -> Self {
        self.processing_ttl = ttl;
        self
    }

    pub fn with_retention_ttl(mut self, ttl: Duration) -> Self {
        self.retention_ttl = ttl;
        self
    }

    pub fn with_degradation_probe_interval(mut self, attempts: u64) -> Self {
        self.degradation_probe_interval = attempts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.application_name.trim().is_empty() {
            anyhow::bail!("application name must not be empty");
        }
        if self.processing_ttl.is_zero() {
            anyhow::bail!("processing TTL must be greater than zero");
        }
        if self.retention_ttl.is_zero() {
            anyhow::bail!("retention TTL must be greater than zero");
        }
        if self.processing_ttl > MAX_RECORD_TTL || self.retention_ttl > MAX_RECORD_TTL {
            anyhow::bail!(
                "record TTLs must not exceed {} days",
                MAX_RECORD_TTL.as_secs() / (24 * SECONDS_PER_HOUR)
            );
        }
        Ok(())
    }

    pub(crate) fn from_env() -> Result<Self> {
        let application_name = std::env::var("DEDUP_APPLICATION_NAME")
            .map_err(|_| anyhow::anyhow!("DEDUP_APPLICATION_NAME must be set"))?;

        let config = Self {
            application_name,
            dedup_enabled: std::env::var("DEDUP_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            processing_ttl: std::env::var("DEDUP_PROCESSING_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_PROCESSING_TTL),
            retention_ttl: std::env::var("DEDUP_RETENTION_MINUTES")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(minutes_to_duration)
                .unwrap_or(DEFAULT_RETENTION_TTL),
            degradation_probe_interval: std::env::var("DEDUP_DEGRADATION_PROBE_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DEGRADATION_PROBE_INTERVAL),
        };

        config.validate()?;
        Ok(config)
    }
}

// Saturates so an absurd value reaches validate() instead of overflowing
fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(SECONDS_PER_MINUTE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DedupConfig::enabled("orders-app");
        assert!(config.dedup_enabled);
        assert_eq!(config.processing_ttl, Duration::from_secs(60));
        assert_eq!(config.retention_ttl, Duration::from_secs(86_400));
        assert_eq!(config.degradation_probe_interval, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_keeps_application() {
        let config = DedupConfig::disabled("orders-app");
        assert!(!config.dedup_enabled);
        assert_eq!(config.application_name, "orders-app");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(DedupConfig::enabled("  ").validate().is_err());
        assert!(DedupConfig::enabled("app")
            .with_processing_ttl(Duration::ZERO)
            .validate()
            .is_err());
        assert!(DedupConfig::enabled("app")
            .with_retention_ttl(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_huge_retention_is_rejected() {
        let retention = minutes_to_duration(u64::MAX);
        assert_eq!(retention, Duration::from_secs(u64::MAX));

        let config = DedupConfig::enabled("app").with_retention_ttl(retention);
        assert!(config.validate().is_err());

        let at_limit = DedupConfig::enabled("app").with_retention_ttl(MAX_RECORD_TTL);
        assert!(at_limit.validate().is_ok());
    }
}
