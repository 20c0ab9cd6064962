//! Configuration for the smartfand client.
//!
//! Handles loading, parsing, and validation of the YAML configuration file
//! that defines the device endpoint, polling cadence and automatic tier
//! policy.

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::fan_tiers::TierTable;

/// Main configuration structure for the smartfand client.
///
/// Deserialized from the YAML configuration file; every field has a default
/// so a missing file falls back to a usable local setup.
///
/// # Example
///
/// ```yaml
/// endpoint: "http://192.168.1.20:5111"
/// tick_seconds: 5
/// request_timeout_secs: 10
///
/// tiers:
///   thresholds: [24.0, 26.0, 28.0]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Device controller base URL.
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// Polling cadence in seconds.
    #[serde(default = "defaults::tick_seconds")]
    pub tick_seconds: u16,

    /// Per-request timeout in seconds.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u16,

    /// Automatic-mode tier policy.
    #[serde(default)]
    pub tiers: TiersCfg,
}

/// Tier policy configuration for automatic mode.
///
/// Two threshold tables circulate for this device family; the table is
/// configuration rather than code so either can be selected per install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiersCfg {
    /// Strictly increasing tier step-up temperatures in °C.
    pub thresholds: [f64; 3],
}

impl Default for TiersCfg {
    fn default() -> Self {
        Self {
            thresholds: TierTable::default().thresholds(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: defaults::endpoint(),
            tick_seconds: defaults::tick_seconds(),
            request_timeout_secs: defaults::request_timeout_secs(),
            tiers: TiersCfg::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the given path or standard locations.
    ///
    /// Search order:
    /// 1. Provided path parameter (must exist)
    /// 2. `SMARTFAND_CONFIG` environment variable
    /// 3. `XDG_CONFIG_HOME/smartfand/config.yml` or `~/.config/smartfand/config.yml`
    /// 4. `/etc/smartfand/config.yml`
    ///
    /// With no file in any location the defaults are used. The
    /// `SMARTFAND_ENDPOINT` environment variable overrides the endpoint
    /// regardless of where the config came from.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match path.or_else(locate_config) {
            Some(config_path) => {
                info!("Loading config from: {}", config_path.display());
                let raw = fs::read_to_string(&config_path).with_context(|| {
                    format!("Failed to read config from {}", config_path.display())
                })?;
                serde_yaml::from_str(&raw).with_context(|| {
                    format!("Failed to parse config at {}", config_path.display())
                })?
            }
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        };

        if let Ok(endpoint) = env::var("SMARTFAND_ENDPOINT") {
            config.endpoint = endpoint;
        }

        Ok(config)
    }

    /// Validates the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            anyhow::bail!(
                "Endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            );
        }
        if self.tick_seconds == 0 {
            anyhow::bail!("tick_seconds must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        self.tier_table()?;
        Ok(())
    }

    /// Builds the tier table from the configured policy.
    pub fn tier_table(&self) -> Result<TierTable> {
        TierTable::new(self.tiers.thresholds).context("Invalid tier policy")
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.tick_seconds))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.request_timeout_secs))
    }
}

fn locate_config() -> Option<PathBuf> {
    if let Ok(env_path) = env::var("SMARTFAND_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("smartfand/config.yml");
        if cfg_dir.exists() {
            return Some(cfg_dir);
        }
    }

    let etc = Path::new("/etc/smartfand/config.yml");
    if etc.exists() {
        return Some(etc.to_path_buf());
    }

    None
}

mod defaults {
    /// Default device endpoint for a local controller.
    pub fn endpoint() -> String {
        "http://localhost:5111".to_string()
    }

    /// Default polling cadence in seconds.
    pub fn tick_seconds() -> u16 {
        5
    }

    /// Default per-request timeout in seconds.
    pub fn request_timeout_secs() -> u16 {
        10
    }
}
