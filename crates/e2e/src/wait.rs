//! Wait tiers used as the "UI has settled" proxy
//!
//! The driver offers no rendering-complete signal, so every pause in the
//! harness goes through one of three named tiers instead of ad-hoc sleeps.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// Named wait tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitTier {
    #[default]
    Short,
    /// Form render
    Medium,
    /// Heavy operations such as asset creation
    Long,
}

/// Durations behind each tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitPolicy {
    pub short_ms: u64,
    pub medium_ms: u64,
    pub long_ms: u64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            short_ms: 400,
            medium_ms: 600,
            long_ms: 3000,
        }
    }
}

impl WaitPolicy {
    /// All tiers at zero, for simulated sessions
    pub fn immediate() -> Self {
        Self {
            short_ms: 0,
            medium_ms: 0,
            long_ms: 0,
        }
    }

    /// Multiply every tier by `factor`, e.g. for slow emulators
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |ms: u64| (ms as f64 * factor.max(0.0)).round() as u64;
        Self {
            short_ms: scale(self.short_ms),
            medium_ms: scale(self.medium_ms),
            long_ms: scale(self.long_ms),
        }
    }

    pub fn duration(&self, tier: WaitTier) -> Duration {
        let ms = match tier {
            WaitTier::Short => self.short_ms,
            WaitTier::Medium => self.medium_ms,
            WaitTier::Long => self.long_ms,
        };
        Duration::from_millis(ms)
    }

    /// Tiers must be non-decreasing
    pub fn is_ordered(&self) -> bool {
        self.short_ms <= self.medium_ms && self.medium_ms <= self.long_ms
    }

    pub async fn wait(&self, tier: WaitTier) {
        let duration = self.duration(tier);
        let ms = duration.as_millis() as u64;
        trace!(?tier, ms, "Waiting");
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    pub async fn short_wait(&self) {
        self.wait(WaitTier::Short).await
    }

    pub async fn medium_wait(&self) {
        self.wait(WaitTier::Medium).await
    }

    pub async fn long_wait(&self) {
        self.wait(WaitTier::Long).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers_are_ordered() {
        let policy = WaitPolicy::default();
        assert!(policy.is_ordered());
        assert_eq!(policy.duration(WaitTier::Short), Duration::from_millis(400));
        assert_eq!(policy.duration(WaitTier::Long), Duration::from_secs(3));
    }

    #[test]
    fn test_scaled() {
        let policy = WaitPolicy::default().scaled(0.5);
        assert_eq!(policy.short_ms, 200);
        assert_eq!(policy.medium_ms, 300);
        assert_eq!(policy.long_ms, 1500);
        assert_eq!(WaitPolicy::default().scaled(-1.0), WaitPolicy::immediate());
    }

    #[test]
    fn test_inverted_tiers_detected() {
        let policy = WaitPolicy {
            short_ms: 900,
            medium_ms: 100,
            long_ms: 1000,
        };
        assert!(!policy.is_ordered());
    }

    #[tokio::test]
    async fn test_immediate_wait_returns() {
        let policy = WaitPolicy::immediate();
        let start = std::time::Instant::now();
        policy.long_wait().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
