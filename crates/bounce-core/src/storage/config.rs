//! TOML-based application configuration.
//!
//! Stores the knobs that are host policy rather than session state:
//! - default duration of a temporary allow
//! - interstitial URL block rules redirect to
//! - decision-service endpoint
//!
//! Configuration is stored at `~/.config/bounce/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::StorageError;

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/bounce/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Minutes a temporary allow lasts when the caller does not say.
    #[serde(default = "default_allow_minutes")]
    pub default_allow_minutes: u64,
    /// Page blocked navigations are redirected to; the blocked domain is
    /// appended as the `target` query parameter.
    #[serde(default = "default_interstitial_url")]
    pub interstitial_url: String,
    /// Decision-service endpoint for the `ask` flow.
    #[serde(default = "default_decision_endpoint")]
    pub decision_endpoint: String,
}

fn default_allow_minutes() -> u64 {
    5
}
fn default_interstitial_url() -> String {
    "bounce://bouncer.html".into()
}
fn default_decision_endpoint() -> String {
    "http://localhost:8787/api/bouncer-decision".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_allow_minutes: default_allow_minutes(),
            interstitial_url: default_interstitial_url(),
            decision_endpoint: default_decision_endpoint(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, StorageError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the default config on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, StorageError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| StorageError::ConfigLoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), StorageError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| StorageError::ConfigSaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| StorageError::ConfigSaveFailed {
            path,
            message: e.to_string(),
        })
    }
}
