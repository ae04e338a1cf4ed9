//! Migration configuration
//!
//! Every section has production defaults; a JSON file may override any
//! subset of fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::client::RetryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub api: ApiConfig,
    pub timing: TimingConfig,
    pub storage: StorageConfig,
    pub restore: RestoreConfig,
    pub gateway: GatewayConfig,
}

/// Dashboard API access
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Shared by every request made with one key
    pub max_requests_per_second: u32,
    pub max_in_flight: usize,
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.meraki.com/api/v1".to_string(),
            user_agent: "meraki-network-migrator/0.1".to_string(),
            request_timeout_secs: 30,
            max_requests_per_second: 10,
            max_in_flight: 4,
            retry: RetryConfig::default(),
        }
    }
}

/// Settle waits between destructive phases, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub after_removal_secs: u64,
    pub after_unclaim_secs: u64,
    pub after_claim_secs: u64,
    pub attach_poll_interval_secs: u64,
    pub attach_poll_attempts: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            after_removal_secs: 60,
            after_unclaim_secs: 180,
            after_claim_secs: 60,
            attach_poll_interval_secs: 30,
            attach_poll_attempts: 5,
        }
    }
}

impl TimingConfig {
    /// No waiting at all; used by tests and dry environments
    pub fn immediate() -> Self {
        Self {
            after_removal_secs: 0,
            after_unclaim_secs: 0,
            after_claim_secs: 0,
            attach_poll_interval_secs: 0,
            attach_poll_attempts: 1,
        }
    }

    pub fn after_removal(&self) -> Duration {
        Duration::from_secs(self.after_removal_secs)
    }

    pub fn after_unclaim(&self) -> Duration {
        Duration::from_secs(self.after_unclaim_secs)
    }

    pub fn after_claim(&self) -> Duration {
        Duration::from_secs(self.after_claim_secs)
    }

    pub fn attach_poll_interval(&self) -> Duration {
        Duration::from_secs(self.attach_poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding snapshot and state files
    pub work_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Written wherever a RADIUS shared secret would be restored
    pub radius_secret_placeholder: String,
    /// Used when the source network reports no time zone
    pub default_time_zone: String,
    /// Appended to the source network name when no target name is given
    pub network_name_suffix: String,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            radius_secret_placeholder: "CHANGE-ME-AFTER-MIGRATION".to_string(),
            default_time_zone: "America/Los_Angeles".to_string(),
            network_name_suffix: "_migrated".to_string(),
        }
    }
}

/// External UI driver invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub headless: bool,
    pub debug: bool,
    pub step_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            headless: false,
            debug: false,
            step_timeout_secs: 300,
        }
    }
}

impl MigrationConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MigrationConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            errors.push(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            ));
        }
        if self.api.max_requests_per_second == 0 {
            errors.push("api.max_requests_per_second must be greater than 0".to_string());
        }
        if self.api.max_in_flight == 0 {
            errors.push("api.max_in_flight must be greater than 0".to_string());
        }
        if self.api.request_timeout_secs == 0 {
            errors.push("api.request_timeout_secs must be greater than 0".to_string());
        }

        let retry = &self.api.retry;
        if retry.backoff_multiplier < 1.0 {
            errors.push("api.retry.backoff_multiplier must be at least 1.0".to_string());
        }
        if retry.initial_delay_ms > retry.max_delay_ms {
            errors.push("api.retry.initial_delay_ms cannot exceed max_delay_ms".to_string());
        }

        if self.timing.attach_poll_attempts == 0 {
            errors.push("timing.attach_poll_attempts must be greater than 0".to_string());
        }
        if self.restore.radius_secret_placeholder.trim().is_empty() {
            errors.push("restore.radius_secret_placeholder cannot be empty".to_string());
        }
        if self.restore.default_time_zone.trim().is_empty() {
            errors.push("restore.default_time_zone cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
