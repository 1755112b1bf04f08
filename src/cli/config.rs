//! Configuration file handling for the vkv CLI
//!
//! Loads connection defaults from `$VKV_CONFIG` or `~/.vkv/config.toml`.
//! The file never holds a token.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{StoreConfig, StoreDefaults};

pub const ENV_CONFIG: &str = "VKV_CONFIG";

/// CLI configuration stored in ~/.vkv/config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Store address
    pub address: Option<String>,

    /// Base namespace
    pub namespace: Option<String>,

    /// Accept invalid TLS certificates
    pub skip_tls_verify: Option<bool>,

    /// Request timeout in seconds
    pub timeout: Option<u64>,
}

impl CliConfig {
    /// Get the configuration file path (`$VKV_CONFIG`, else ~/.vkv/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Unable to determine home directory")?;

        let mut path = PathBuf::from(home);
        path.push(".vkv");
        path.push("config.toml");

        Ok(path)
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_path()?)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn store_defaults(&self) -> StoreDefaults {
        StoreDefaults {
            address: self.address.clone(),
            namespace: self.namespace.clone(),
            skip_tls_verify: self.skip_tls_verify,
            timeout: self.timeout,
        }
    }
}

/// Resolve the store connection settings
///
/// Checks sources in the following priority order:
/// 1. `STORE_*` / `VKV_*` environment variables
/// 2. the config file
/// 3. built-in defaults
pub fn resolve_store_config(config_path: Option<&Path>) -> Result<StoreConfig> {
    let file = match config_path {
        Some(path) => CliConfig::load_from_path(path)?,
        None => CliConfig::load()?,
    };
    let store = StoreConfig::from_env_or(&file.store_defaults())
        .context("Failed to resolve store connection settings")?;
    debug!(address = %store.address, namespace = ?store.namespace, "Resolved store connection");
    Ok(store)
}

/// Whether ANSI colour is allowed: off when `NO_COLOR` is set to anything.
pub fn resolve_color(is_terminal: bool) -> bool {
    is_terminal && std::env::var_os("NO_COLOR").map_or(true, |v| v.is_empty())
}

/// Whether OSC-8 hyperlinks are allowed: off when `NO_HYPERLINKS` is set.
pub fn resolve_hyperlinks() -> bool {
    std::env::var_os("NO_HYPERLINKS").map_or(true, |v| v.is_empty())
}
