//! Background token renewal.
//!
//! A single tokio task looks up the current token on every tick and renews
//! it once less than half of its creation TTL remains. It only issues
//! token lookup/renew calls and never touches secret paths or namespaces.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};

use crate::config::{RenewalConfig, StoreConfig};
use crate::errors::{Result, VkvError};

/// Whether a token with `ttl` seconds left out of `creation_ttl` should be
/// renewed. Tokens without a TTL never expire.
pub fn needs_renewal(ttl: u64, creation_ttl: u64) -> bool {
    creation_ttl > 0 && ttl < creation_ttl / 2
}

/// Periodic token renewal task.
pub struct TokenRefresher {
    client: VaultClient,
    config: RenewalConfig,
}

impl std::fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("config", &self.config)
            .field("client", &"[VaultClient]")
            .finish()
    }
}

impl TokenRefresher {
    pub fn new(store: &StoreConfig, config: RenewalConfig) -> Result<Self> {
        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&store.address);
        settings_builder.token(&store.token);
        settings_builder.verify(!store.skip_tls_verify);
        if let Some(namespace) = &store.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }

        let settings = settings_builder.build().map_err(|e| {
            VkvError::bad_input(format!("invalid token refresher configuration: {}", e))
        })?;
        let client = VaultClient::new(settings)
            .map_err(|e| VkvError::transport(format!("failed to create token client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Look the token up and renew it when due. Returns whether it renewed.
    pub async fn tick(&self) -> Result<bool> {
        let token = vaultrs::token::lookup_self(&self.client)
            .await
            .map_err(|e| VkvError::transport(format!("token lookup failed: {}", e)))?;

        debug!(ttl = token.ttl, creation_ttl = token.creation_ttl, "Token lookup");
        if !needs_renewal(token.ttl, token.creation_ttl) {
            return Ok(false);
        }

        let increment = format!("{}s", self.config.increment.as_secs());
        vaultrs::token::renew_self(&self.client, Some(&increment))
            .await
            .map_err(|e| VkvError::transport(format!("token renewal failed: {}", e)))?;
        info!(increment = %increment, "Renewed store token");
        Ok(true)
    }

    /// Run until `cancel` fires. Failures are logged and retried on the next
    /// tick.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Token refresher stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = self.tick().await {
                            warn!(error = %e, "Token refresh failed");
                        }
                    }
                }
            }
        })
    }
}

/// Start the refresher when enabled, returning its handle.
pub fn start_refresher(
    store: &StoreConfig,
    config: RenewalConfig,
    cancel: CancellationToken,
) -> Result<Option<JoinHandle<()>>> {
    if !config.enabled {
        debug!("Token refresher disabled");
        return Ok(None);
    }
    Ok(Some(TokenRefresher::new(store, config)?.spawn(cancel)))
}
