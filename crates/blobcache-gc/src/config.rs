//! Configuration for the quota keeper and retry policy
//!
//! Invalid configuration fails fast through `validate()` before any I/O.

use crate::error::{GcError, Result};
use crate::types::NamespaceId;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

fn default_percentile_step() -> f64 {
    0.05
}

fn default_batch_size() -> usize {
    1000
}

/// Quota for one namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcNamespaceConfig {
    pub universe: String,
    pub namespace: String,
    pub max_size_gb: f64,
}

impl GcNamespaceConfig {
    pub fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(self.universe.clone(), self.namespace.clone())
    }

    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_gb * BYTES_PER_GB) as u64
    }
}

/// Configuration of one QuotaKeeper run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaKeeperConfig {
    /// Records accessed more recently than this are never deleted
    pub last_access_deletion_threshold_secs: i64,
    pub namespaces: Vec<GcNamespaceConfig>,
    /// Fraction of the ordered candidate space materialized per enumeration
    /// chunk; trades eviction-order precision for scan cost
    #[serde(default = "default_percentile_step")]
    pub lru_enumeration_percentile_step: f64,
    #[serde(default = "default_batch_size")]
    pub lru_enumeration_batch_size: usize,
}

impl QuotaKeeperConfig {
    pub fn deletion_threshold(&self) -> Duration {
        Duration::seconds(self.last_access_deletion_threshold_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.last_access_deletion_threshold_secs < 0 {
            return Err(GcError::Config(
                "last_access_deletion_threshold_secs must be non-negative".to_string(),
            ));
        }
        if !(self.lru_enumeration_percentile_step > 0.0
            && self.lru_enumeration_percentile_step <= 1.0)
        {
            return Err(GcError::Config(format!(
                "lru_enumeration_percentile_step must be in (0, 1], got {}",
                self.lru_enumeration_percentile_step
            )));
        }
        if self.lru_enumeration_batch_size == 0 {
            return Err(GcError::Config(
                "lru_enumeration_batch_size must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for ns in &self.namespaces {
            if ns.max_size_gb <= 0.0 {
                return Err(GcError::Config(format!(
                    "max_size_gb must be positive for namespace {}",
                    ns.namespace_id()
                )));
            }
            if !seen.insert(ns.namespace_id()) {
                return Err(GcError::Config(format!(
                    "duplicate namespace {}",
                    ns.namespace_id()
                )));
            }
        }
        Ok(())
    }
}

/// Retry strategy kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RetryKind {
    #[default]
    ExponentialBackoff,
}

/// Bounds for the optimistic-concurrency retry loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    #[serde(default)]
    pub kind: RetryKind,
    pub minimum_retry_window_ms: u64,
    pub maximum_retry_window_ms: u64,
    /// Fractional jitter applied to each delay, in [0, 1]
    pub window_jitter: f64,
    pub maximum_attempts: u32,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            kind: RetryKind::ExponentialBackoff,
            minimum_retry_window_ms: 10,
            maximum_retry_window_ms: 5000,
            window_jitter: 0.2,
            maximum_attempts: 20,
        }
    }
}

impl RetryPolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.minimum_retry_window_ms == 0 {
            return Err(GcError::Config(
                "minimum_retry_window_ms must be at least 1".to_string(),
            ));
        }
        if self.maximum_retry_window_ms < self.minimum_retry_window_ms {
            return Err(GcError::Config(format!(
                "maximum_retry_window_ms ({}) is below minimum_retry_window_ms ({})",
                self.maximum_retry_window_ms, self.minimum_retry_window_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.window_jitter) {
            return Err(GcError::Config(format!(
                "window_jitter must be in [0, 1], got {}",
                self.window_jitter
            )));
        }
        if self.maximum_attempts == 0 {
            return Err(GcError::Config(
                "maximum_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota_config() -> QuotaKeeperConfig {
        QuotaKeeperConfig {
            last_access_deletion_threshold_secs: 3600,
            namespaces: vec![GcNamespaceConfig {
                universe: "u".to_string(),
                namespace: "n".to_string(),
                max_size_gb: 1.0,
            }],
            lru_enumeration_percentile_step: default_percentile_step(),
            lru_enumeration_batch_size: default_batch_size(),
        }
    }

    #[test]
    fn test_defaults_from_json() {
        let config: QuotaKeeperConfig = serde_json::from_str(
            r#"{"last_access_deletion_threshold_secs": 60, "namespaces": []}"#,
        )
        .unwrap();
        assert_eq!(config.lru_enumeration_percentile_step, 0.05);
        assert_eq!(config.lru_enumeration_batch_size, 1000);
    }

    #[test]
    fn test_valid_config_passes() {
        quota_config().validate().unwrap();
        RetryPolicyConfig::default().validate().unwrap();
    }

    #[test]
    fn test_max_size_bytes() {
        let ns = GcNamespaceConfig {
            universe: "u".to_string(),
            namespace: "n".to_string(),
            max_size_gb: 2.0,
        };
        assert_eq!(ns.max_size_bytes(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_zero_quota_rejected() {
        let mut config = quota_config();
        config.namespaces[0].max_size_gb = 0.0;
        assert!(matches!(config.validate(), Err(GcError::Config(_))));
    }

    #[test]
    fn test_duplicate_namespace_rejected() {
        let mut config = quota_config();
        config.namespaces.push(config.namespaces[0].clone());
        assert!(matches!(config.validate(), Err(GcError::Config(_))));
    }

    #[test]
    fn test_bad_percentile_step_rejected() {
        let mut config = quota_config();
        config.lru_enumeration_percentile_step = 0.0;
        assert!(config.validate().is_err());
        config.lru_enumeration_percentile_step = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = quota_config();
        config.lru_enumeration_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_retry_windows_rejected() {
        let config = RetryPolicyConfig {
            minimum_retry_window_ms: 100,
            maximum_retry_window_ms: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GcError::Config(_))));
    }

    #[test]
    fn test_bad_jitter_rejected() {
        let config = RetryPolicyConfig {
            window_jitter: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
