//! Configuration loading and types.
//!
//! YAML file plus a handful of environment overrides for the secrets. Every
//! file path the engine touches derives from `paths.data_dir`, so one
//! setting relocates the whole on-disk layout.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fleetbridge_sync::{CategoryMap, RetryPolicy};

use crate::error::{CliError, CliResult};

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub target: TargetConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub categories: CategoryMap,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Target platform credentials and endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// API base URL, e.g. `https://api.example.com/v2`.
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_token: String,
}

/// On-disk layout.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Root of snapshots, overrides, runtime state, and outputs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl PathsConfig {
    pub fn devices_snapshot(&self) -> PathBuf {
        self.data_dir.join("source_devices.json")
    }

    pub fn counters_snapshot(&self) -> PathBuf {
        self.data_dir.join("source_counters.json")
    }

    pub fn supplies_snapshot(&self) -> PathBuf {
        self.data_dir.join("source_supplies.json")
    }

    pub fn customers_snapshot(&self) -> PathBuf {
        self.data_dir.join("target_customers.json")
    }

    pub fn equipment_snapshot(&self) -> PathBuf {
        self.data_dir.join("target_equipment.json")
    }

    pub fn exceptions_file(&self) -> PathBuf {
        self.data_dir.join("config/client_exceptions.json")
    }

    pub fn manual_flags_file(&self) -> PathBuf {
        self.data_dir.join("config/manual_documents.json")
    }

    pub fn token_cache(&self) -> PathBuf {
        self.data_dir.join("runtime/token.json")
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.data_dir.join("runtime/locks")
    }

    pub fn status_file(&self) -> PathBuf {
        self.data_dir.join("runtime/status.json")
    }

    pub fn create_payload(&self) -> PathBuf {
        self.data_dir.join("out/create_payload.json")
    }

    pub fn update_payload(&self) -> PathBuf {
        self.data_dir.join("out/update_payload.json")
    }

    pub fn automatic_view(&self) -> PathBuf {
        self.data_dir.join("out/automatic_customers.json")
    }

    pub fn manual_view(&self) -> PathBuf {
        self.data_dir.join("out/manual_customers.json")
    }

    pub fn orphans_file(&self) -> PathBuf {
        self.data_dir.join("out/orphan_equipment.json")
    }
}

/// Dispatch pacing and retry bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_auth_attempts")]
    pub max_auth_attempts: u32,
    #[serde(default = "default_max_rate_limit_attempts")]
    pub max_rate_limit_attempts: u32,
    #[serde(default = "default_rate_limit_base_secs")]
    pub rate_limit_base_secs: u64,
    #[serde(default = "default_rate_limit_cap_secs")]
    pub rate_limit_cap_secs: u64,
    #[serde(default = "default_inter_request_delay_ms")]
    pub inter_request_delay_ms: u64,
}

fn default_max_auth_attempts() -> u32 {
    3
}

fn default_max_rate_limit_attempts() -> u32 {
    6
}

fn default_rate_limit_base_secs() -> u64 {
    1
}

fn default_rate_limit_cap_secs() -> u64 {
    5
}

fn default_inter_request_delay_ms() -> u64 {
    280
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_auth_attempts: default_max_auth_attempts(),
            max_rate_limit_attempts: default_max_rate_limit_attempts(),
            rate_limit_base_secs: default_rate_limit_base_secs(),
            rate_limit_cap_secs: default_rate_limit_cap_secs(),
            inter_request_delay_ms: default_inter_request_delay_ms(),
        }
    }
}

impl DispatchConfig {
    /// Convert to the dispatcher's policy.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_auth_attempts: self.max_auth_attempts,
            max_rate_limit_attempts: self.max_rate_limit_attempts,
            rate_limit_base: Duration::from_secs(self.rate_limit_base_secs),
            rate_limit_cap: Duration::from_secs(self.rate_limit_cap_secs),
            auth_retry_delay: Duration::from_millis(200),
            inter_request_delay: Duration::from_millis(self.inter_request_delay_ms),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::config(format!(
                "failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> CliResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| CliError::config(format!("failed to parse config: {e}")))
    }

    /// Configuration file path from the environment or the default.
    #[must_use]
    pub fn config_path() -> String {
        std::env::var("FLEETBRIDGE_CONFIG")
            .unwrap_or_else(|_| "./config/fleetbridge.yaml".to_string())
    }

    /// Apply environment variable overrides (secrets and paths).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FLEETBRIDGE_TARGET_URL") {
            self.target.base_url = url;
        }
        if let Ok(key) = std::env::var("FLEETBRIDGE_API_KEY") {
            self.target.api_key = key;
        }
        if let Ok(token) = std::env::var("FLEETBRIDGE_API_TOKEN") {
            self.target.api_token = token;
        }
        if let Ok(dir) = std::env::var("FLEETBRIDGE_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
    }

    /// Validate the parts every command needs.
    pub fn validate(&self) -> CliResult<()> {
        if self.target.base_url.trim().is_empty() {
            return Err(CliError::config("target.base_url is empty"));
        }
        Ok(())
    }
}
