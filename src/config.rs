//! Configuration Management
//!
//! Handles persistent configuration storage for armctl.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Public cloud management endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com/";

/// Environment variable holding the bearer token unless configured otherwise
pub const DEFAULT_TOKEN_ENV: &str = "ARM_ACCESS_TOKEN";

/// Environment variable overriding the configured endpoint
pub const ENDPOINT_ENV: &str = "ARM_ENDPOINT";

/// How long to wait for remote state to converge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollSettings {
    /// Delay between probes while a resource is still converging
    pub interval_ms: u64,
    /// Consecutive successful probes required before trusting a read
    pub stabilization: u32,
    /// Lower bound on spacing between state refreshes
    pub min_interval_ms: u64,
    /// Consecutive target-state observations required by state waits
    pub required_hits: u32,
    /// Overall budget for one wait
    pub timeout_secs: u64,
    /// Consecutive "not found" reads tolerated by state waits, unlimited when unset
    pub not_found_checks: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            stabilization: 1,
            min_interval_ms: 15_000,
            required_hits: 1,
            timeout_secs: 30 * 60,
            not_found_checks: None,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Management API endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Subscription used when an id has to be built from parts
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Name of the environment variable carrying the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub polling: PollSettings,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            subscription_id: None,
            token_env: default_token_env(),
            polling: PollSettings::default(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("armctl").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file is absent or unreadable
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    /// Get effective endpoint (environment > config)
    pub fn effective_endpoint(&self) -> String {
        std::env::var(ENDPOINT_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.endpoint.clone())
    }

    /// Read the bearer token from the configured environment variable
    pub fn access_token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|v| !v.is_empty())
    }
}
