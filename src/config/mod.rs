//! # Configuration Management
//!
//! Connection settings for the remote store and tunables for the background
//! token refresher, read from environment variables.

use std::fmt;
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::errors::{Result, VkvError};

pub const ENV_ADDRESS: &str = "STORE_ADDRESS";
pub const ENV_TOKEN: &str = "STORE_TOKEN";
pub const ENV_NAMESPACE: &str = "STORE_NAMESPACE";
pub const ENV_SKIP_TLS_VERIFY: &str = "STORE_SKIP_TLS_VERIFY";
pub const ENV_LOGIN_COMMAND: &str = "VKV_LOGIN_COMMAND";
pub const ENV_REQUEST_TIMEOUT: &str = "VKV_REQUEST_TIMEOUT";
pub const ENV_RENEWAL_INTERVAL: &str = "VKV_RENEWAL_INTERVAL";
pub const ENV_RENEWAL_INCREMENT: &str = "VKV_RENEWAL_INCREMENT";
pub const ENV_REFRESHER_ENABLED: &str = "VKV_LEASE_REFRESHER_ENABLED";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the store.
#[derive(Clone)]
pub struct StoreConfig {
    /// Store address, e.g. `https://vault.example.com:8200`
    pub address: String,

    /// Token sent with every request
    pub token: String,

    /// Base namespace every call is relative to
    pub namespace: Option<String>,

    /// Accept invalid TLS certificates
    pub skip_tls_verify: bool,

    /// Per-request timeout
    pub timeout: Duration,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("address", &self.address)
            .field("token", &"[REDACTED]")
            .field("namespace", &self.namespace)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StoreConfig {
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: token.into(),
            namespace: None,
            skip_tls_verify: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace =
            if namespace.trim_matches('/').is_empty() { None } else { Some(namespace) };
        self
    }

    /// Load connection settings from the environment.
    ///
    /// The token comes from `STORE_TOKEN`, or from the trimmed standard output
    /// of `VKV_LOGIN_COMMAND` when no token is set.
    pub fn from_env() -> Result<Self> {
        Self::from_env_or(&StoreDefaults::default())
    }

    /// Like [`StoreConfig::from_env`], falling back to `defaults` for every
    /// setting the environment leaves unset.
    pub fn from_env_or(defaults: &StoreDefaults) -> Result<Self> {
        let address = non_empty_env(ENV_ADDRESS)
            .or_else(|| defaults.address.clone())
            .ok_or_else(|| VkvError::bad_input(format!("{} is not set", ENV_ADDRESS)))?;
        let token = resolve_token(non_empty_env(ENV_TOKEN), non_empty_env(ENV_LOGIN_COMMAND))?;

        let timeout = match non_empty_env(ENV_REQUEST_TIMEOUT) {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|e| {
                VkvError::bad_input(format!("invalid {} '{}': {}", ENV_REQUEST_TIMEOUT, raw, e))
            })?),
            None => Duration::from_secs(defaults.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        };

        Ok(Self {
            address,
            token,
            namespace: non_empty_env(ENV_NAMESPACE).or_else(|| defaults.namespace.clone()),
            skip_tls_verify: env_flag(
                ENV_SKIP_TLS_VERIFY,
                defaults.skip_tls_verify.unwrap_or(false),
            )?,
            timeout,
        })
    }
}

/// Fallbacks for settings missing from the environment, usually read from
/// the CLI config file. Tokens are never part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreDefaults {
    pub address: Option<String>,
    pub namespace: Option<String>,
    pub skip_tls_verify: Option<bool>,
    pub timeout: Option<u64>,
}

/// Pick the token: an explicit value wins, otherwise run the login command.
pub fn resolve_token(token: Option<String>, login_command: Option<String>) -> Result<String> {
    if let Some(token) = token {
        debug!("Using token from {}", ENV_TOKEN);
        return Ok(token);
    }

    let Some(command) = login_command else {
        return Err(VkvError::bad_input(format!(
            "no token found: set {} or {}",
            ENV_TOKEN, ENV_LOGIN_COMMAND
        )));
    };

    debug!("Obtaining token from login command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .output()
        .map_err(|e| VkvError::io(ENV_LOGIN_COMMAND, e))?;

    if !output.status.success() {
        return Err(VkvError::bad_input(format!(
            "login command exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(VkvError::bad_input("login command printed no token"));
    }
    Ok(token)
}

/// Settings of the background token refresher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub increment: Duration,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
            increment: Duration::from_secs(30),
        }
    }
}

impl RenewalConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: env_flag(ENV_REFRESHER_ENABLED, defaults.enabled)?,
            interval: env_seconds(ENV_RENEWAL_INTERVAL)?.unwrap_or(defaults.interval),
            increment: env_seconds(ENV_RENEWAL_INCREMENT)?.unwrap_or(defaults.increment),
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(name: &str, default: bool) -> Result<bool> {
    match non_empty_env(name) {
        None => Ok(default),
        Some(raw) => parse_flag(&raw)
            .ok_or_else(|| VkvError::bad_input(format!("invalid boolean for {}: '{}'", name, raw))),
    }
}

fn env_seconds(name: &str) -> Result<Option<Duration>> {
    match non_empty_env(name) {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim().trim_end_matches('s');
            let secs: u64 = trimmed.parse().map_err(|e| {
                VkvError::bad_input(format!("invalid duration for {}: '{}': {}", name, raw, e))
            })?;
            Ok(Some(Duration::from_secs(secs)))
        }
    }
}

/// Parse the usual spellings of a boolean flag.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("Off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_renewal_defaults() {
        let config = RenewalConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.increment, Duration::from_secs(30));
    }

    #[test]
    fn test_resolve_token_prefers_explicit_value() {
        let token = resolve_token(Some("s.abc".into()), Some("exit 1".into())).unwrap();
        assert_eq!(token, "s.abc");
    }

    #[test]
    fn test_resolve_token_from_login_command() {
        let token = resolve_token(None, Some("echo '  s.from-login  '".into())).unwrap();
        assert_eq!(token, "s.from-login");
    }

    #[test]
    fn test_resolve_token_failures() {
        assert!(resolve_token(None, None).is_err());
        assert!(resolve_token(None, Some("exit 3".into())).is_err());
        assert!(resolve_token(None, Some("true".into())).is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = StoreConfig::new("http://127.0.0.1:8200", "s.secret-token");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s.secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_env_or_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        for name in [ENV_ADDRESS, ENV_NAMESPACE, ENV_SKIP_TLS_VERIFY, ENV_REQUEST_TIMEOUT] {
            std::env::remove_var(name);
        }
        std::env::set_var(ENV_TOKEN, "s.token");

        let defaults = StoreDefaults {
            address: Some("https://from-file:8200".into()),
            namespace: Some("team".into()),
            skip_tls_verify: Some(true),
            timeout: Some(5),
        };
        let config = StoreConfig::from_env_or(&defaults).unwrap();
        assert_eq!(config.address, "https://from-file:8200");
        assert_eq!(config.namespace.as_deref(), Some("team"));
        assert!(config.skip_tls_verify);
        assert_eq!(config.timeout, Duration::from_secs(5));

        std::env::set_var(ENV_ADDRESS, "https://from-env:8200");
        let config = StoreConfig::from_env_or(&defaults).unwrap();
        assert_eq!(config.address, "https://from-env:8200");

        std::env::remove_var(ENV_ADDRESS);
        assert!(StoreConfig::from_env().is_err());
        std::env::remove_var(ENV_TOKEN);
    }

    #[test]
    fn test_with_namespace_ignores_root() {
        let config = StoreConfig::new("http://x", "t").with_namespace("/");
        assert!(config.namespace.is_none());
        let config = StoreConfig::new("http://x", "t").with_namespace("team");
        assert_eq!(config.namespace.as_deref(), Some("team"));
    }
}
