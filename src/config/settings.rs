//! User settings and preferences
//!
//! Manages settings stored in ~/.dbcontext/config.toml

use crate::config::ConnectionConfig;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Where snapshot files are written (defaults to the per-user data folder)
    #[serde(default)]
    pub metadata_dir: Option<PathBuf>,

    /// Extra statement files, loaded on top of the built-in catalog
    #[serde(default)]
    pub statements_dir: Option<PathBuf>,

    /// Rows fetched for table data samples
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,

    /// Compute per-column profiles for table reports
    #[serde(default = "default_true")]
    pub include_profile: bool,

    /// Per-command timeout applied by connections
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_sample_rows() -> usize {
    20
}

fn default_command_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            metadata_dir: None,
            statements_dir: None,
            sample_rows: default_sample_rows(),
            include_profile: default_true(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl Settings {
    /// Resolved snapshot directory
    pub fn metadata_dir(&self) -> ConfigResult<PathBuf> {
        if let Some(dir) = &self.metadata_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_local_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(base.join("dbcontext").join("metadata"))
    }
}

/// Parse settings from TOML text
pub fn parse_settings(content: &str) -> ConfigResult<Settings> {
    Ok(toml::from_str(content)?)
}

/// Load settings from config file
pub fn load_settings() -> ConfigResult<Settings> {
    let path = ConnectionConfig::config_dir()?.join("config.toml");
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    parse_settings(&content)
}
