//! Application configuration, loaded from TOML.
//!
//! ```toml
//! [app]
//! name = "Luminate"
//! key = "0123456789abcdef0123456789abcdef"
//!
//! [server]
//! address = "0.0.0.0:3000"
//!
//! [plugins]
//! enabled = ["product"]
//!
//! [session]
//! lifetime_secs = 3600
//! ```

use crate::session::SessionConfig;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use switchyard_web::ServerConfig;
use thiserror::Error;

/// Required length of [`AppConfig::key`] in bytes.
pub const APP_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub plugins: PluginsConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub env: String,
    pub debug: bool,
    pub url: String,
    /// Application secret; must be exactly [`APP_KEY_LEN`] bytes.
    pub key: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Luminate".to_owned(),
            env: "production".to_owned(),
            debug: false,
            url: "http://localhost".to_owned(),
            key: String::new(),
        }
    }
}

/// Plugins to load, by registered name. Empty means every registered plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub enabled: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("app key is required")]
    MissingKey,

    #[error("app key must be {APP_KEY_LEN} bytes, got {len}")]
    InvalidKey { len: usize },
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.app.key.len() {
            0 => Err(ConfigError::MissingKey),
            APP_KEY_LEN => Ok(()),
            len => Err(ConfigError::InvalidKey { len }),
        }
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}
