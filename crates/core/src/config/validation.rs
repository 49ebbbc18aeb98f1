//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `budget_bytes` is 0
    /// - `evict_target_ratio` is outside `(0, 1]`
    /// - `max_bytes` is 0 or larger than the budget
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.budget_bytes == 0 {
            return Err(ConfigError::Invalid { field: "budget_bytes".into(), reason: "must be greater than 0".into() });
        }

        if !(self.evict_target_ratio > 0.0 && self.evict_target_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "evict_target_ratio".into(),
                reason: "must be in the range (0, 1]".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes as u64 > self.budget_bytes {
            return Err(ConfigError::Invalid {
                field: "max_bytes".into(),
                reason: "must not exceed budget_bytes".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.evict_target_ratio == 1.0 {
            tracing::warn!(
                budget_bytes = self.budget_bytes,
                "evict_target_ratio is 1.0; every write past the budget will trigger another eviction"
            );
        }

        Ok(())
    }
}
