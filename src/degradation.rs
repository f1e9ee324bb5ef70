// ============================================================================
// Degradation Guard
// ============================================================================
//
// Keeps consumption going while the record store is down.
//
// States:
// - Healthy: every message goes through the store
// - Degraded: messages bypass dedup and run directly; after
//   `probe_interval` bypasses the next message probes the store again
//
// A successful probe returns to Healthy. A failed probe stays Degraded and
// restarts the count with the probing message itself.
//
// ============================================================================

use dedup_error::StoreError;
use dedup_metrics::{DEDUP_DEGRADED, DEDUP_DEGRADED_BYPASS_TOTAL};
use tokio::sync::RwLock;

/// Snapshot of the guard's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DegradationState {
    pub is_degraded: bool,
    pub consecutive_skips: u64,
}

/// What to do with the next message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Store is healthy, use it
    Normal,
    /// Store was failing; try it again with this message
    Probe,
    /// Store is failing; run the handler without dedup
    Bypass,
}

/// Per-engine degradation state
pub struct DegradationGuard {
    application: String,
    probe_interval: u64,
    state: RwLock<DegradationState>,
}

impl DegradationGuard {
    pub fn new(application: impl Into<String>, probe_interval: u64) -> Self {
        Self {
            application: application.into(),
            probe_interval,
            state: RwLock::new(DegradationState::default()),
        }
    }

    pub async fn state(&self) -> DegradationState {
        *self.state.read().await
    }

    pub async fn is_degraded(&self) -> bool {
        self.state.read().await.is_degraded
    }

    /// Decide whether the next message may touch the store
    pub async fn admit(&self) -> Admission {
        if !self.state.read().await.is_degraded {
            return Admission::Normal;
        }

        let mut state = self.state.write().await;
        if !state.is_degraded {
            // Recovered while we waited for the lock
            return Admission::Normal;
        }

        if state.consecutive_skips >= self.probe_interval {
            state.consecutive_skips = 0;
            tracing::info!(
                application = %self.application,
                "Probing dedup record store after degradation"
            );
            return Admission::Probe;
        }

        state.consecutive_skips += 1;
        DEDUP_DEGRADED_BYPASS_TOTAL.inc();
        tracing::debug!(
            application = %self.application,
            consecutive_skips = state.consecutive_skips,
            "Dedup degraded, bypassing record store"
        );
        Admission::Bypass
    }

    /// A store call succeeded
    pub async fn record_success(&self) {
        if !self.state.read().await.is_degraded {
            return;
        }

        let mut state = self.state.write().await;
        if state.is_degraded {
            *state = DegradationState::default();
            DEDUP_DEGRADED
                .with_label_values(&[self.application.as_str()])
                .set(0);
            tracing::info!(
                application = %self.application,
                "Dedup record store recovered, leaving degraded mode"
            );
        }
    }

    /// A store call failed; the message that hit the failure is bypassed too
    pub async fn record_failure(&self, error: &StoreError) {
        let mut state = self.state.write().await;
        let was_degraded = state.is_degraded;
        state.is_degraded = true;
        state.consecutive_skips = 1;
        drop(state);

        DEDUP_DEGRADED_BYPASS_TOTAL.inc();
        DEDUP_DEGRADED
            .with_label_values(&[self.application.as_str()])
            .set(1);

        if was_degraded {
            tracing::warn!(
                application = %self.application,
                error = %error,
                "Dedup record store probe failed, staying degraded"
            );
        } else {
            tracing::warn!(
                application = %self.application,
                error = %error,
                connectivity = error.is_connectivity(),
                "Dedup record store failed, degrading to consumption without dedup"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outage() -> StoreError {
        StoreError::Unavailable("connection refused".into())
    }

    #[tokio::test]
    async fn test_healthy_guard_admits_normally() {
        let guard = DegradationGuard::new("app", 3);
        assert_eq!(guard.admit().await, Admission::Normal);
        guard.record_success().await;
        assert_eq!(guard.state().await, DegradationState::default());
    }

    #[tokio::test]
    async fn test_probe_after_interval() {
        let guard = DegradationGuard::new("app", 3);
        guard.record_failure(&outage()).await;
        assert_eq!(
            guard.state().await,
            DegradationState {
                is_degraded: true,
                consecutive_skips: 1
            }
        );

        assert_eq!(guard.admit().await, Admission::Bypass);
        assert_eq!(guard.admit().await, Admission::Bypass);
        assert_eq!(guard.state().await.consecutive_skips, 3);
        assert_eq!(guard.admit().await, Admission::Probe);
    }

    #[tokio::test]
    async fn test_successful_probe_recovers() {
        let guard = DegradationGuard::new("app", 1);
        guard.record_failure(&outage()).await;

        assert_eq!(guard.admit().await, Admission::Probe);
        guard.record_success().await;

        assert!(!guard.is_degraded().await);
        assert_eq!(guard.admit().await, Admission::Normal);
    }

    #[tokio::test]
    async fn test_failed_probe_restarts_count() {
        let guard = DegradationGuard::new("app", 2);
        guard.record_failure(&outage()).await;
        assert_eq!(guard.admit().await, Admission::Bypass);
        assert_eq!(guard.admit().await, Admission::Probe);

        guard.record_failure(&outage()).await;
        assert_eq!(guard.state().await.consecutive_skips, 1);
        assert_eq!(guard.admit().await, Admission::Bypass);
        assert_eq!(guard.admit().await, Admission::Probe);
    }
}
