//! Application configuration with layered loading.
//!
//! Configuration is read once at startup using figment:
//!
//! 1. Environment variables (POSTERFRAME_*)
//! 2. TOML config file (if POSTERFRAME_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The size budget and eviction ratio are fixed for the lifetime of the
//! process; nothing mutates them at runtime.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (POSTERFRAME_*)
/// 2. TOML config file (if POSTERFRAME_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache index.
    ///
    /// Set via POSTERFRAME_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding cached image blobs.
    ///
    /// Set via POSTERFRAME_BLOB_DIR environment variable.
    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,

    /// Disk budget for all cached blobs, in bytes.
    ///
    /// Set via POSTERFRAME_BUDGET_BYTES environment variable.
    #[serde(default = "default_budget_bytes")]
    pub budget_bytes: u64,

    /// Fraction of the budget eviction shrinks the cache down to.
    ///
    /// Set via POSTERFRAME_EVICT_TARGET_RATIO environment variable.
    #[serde(default = "default_evict_target_ratio")]
    pub evict_target_ratio: f64,

    /// User-Agent string for image requests.
    ///
    /// Set via POSTERFRAME_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes accepted for a single image.
    ///
    /// Set via POSTERFRAME_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via POSTERFRAME_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./posterframe-index.sqlite")
}

fn default_blob_dir() -> PathBuf {
    PathBuf::from("./posterframe-blobs")
}

fn default_budget_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_evict_target_ratio() -> f64 {
    0.8
}

fn default_user_agent() -> String {
    "posterframe/0.1".into()
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            blob_dir: default_blob_dir(),
            budget_bytes: default_budget_bytes(),
            evict_target_ratio: default_evict_target_ratio(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Size policy handed to the cache coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSettings {
    /// Disk budget in bytes.
    pub budget_bytes: u64,
    /// Eviction shrinks the cache to `budget_bytes * evict_target_ratio`.
    pub evict_target_ratio: f64,
}

impl CacheSettings {
    pub fn new(budget_bytes: u64, evict_target_ratio: f64) -> Self {
        Self { budget_bytes, evict_target_ratio }
    }

    /// Byte total eviction aims for once the budget is exceeded.
    pub fn target_bytes(&self) -> u64 {
        (self.budget_bytes as f64 * self.evict_target_ratio).floor() as u64
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::new(default_budget_bytes(), default_evict_target_ratio())
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The coordinator's view of the size policy.
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings::new(self.budget_bytes, self.evict_target_ratio)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("POSTERFRAME_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("POSTERFRAME_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
