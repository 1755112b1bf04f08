//! Remote store client trait.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::types::{Capability, SecretLeaf, SecretValue};
use crate::errors::Result;

/// Logical operations vkv needs from the store.
///
/// Every call names its target namespace explicitly (relative to the
/// client's base namespace, `""` meaning the base itself). Implementations
/// derive the namespace header per request, so nothing set for one call is
/// visible to the next.
///
/// # Errors
///
/// - [`VkvError::NotFound`](crate::VkvError::NotFound) when a path has no
///   listable children or is not a leaf
/// - [`VkvError::Forbidden`](crate::VkvError::Forbidden) when the token
///   lacks permission
/// - [`VkvError::Conflict`](crate::VkvError::Conflict) when a namespace or
///   engine already exists and the call was not idempotent
/// - [`VkvError::Transport`](crate::VkvError::Transport) /
///   [`VkvError::Protocol`](crate::VkvError::Protocol) for connection and
///   response failures
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// List one level below `sub_path`. Directory names end with `/`.
    async fn list(&self, namespace: &str, engine: &str, sub_path: &str) -> Result<Vec<String>>;

    /// Read the latest version of the leaf at `sub_path`.
    async fn read(&self, namespace: &str, engine: &str, sub_path: &str) -> Result<SecretLeaf>;

    /// Write a new version of the leaf at `sub_path` and return its version.
    async fn write(
        &self,
        namespace: &str,
        engine: &str,
        sub_path: &str,
        data: &BTreeMap<String, SecretValue>,
    ) -> Result<u64>;

    /// Names (without trailing `/`) of the versioned key/value engines
    /// mounted in `namespace`.
    async fn list_engines(&self, namespace: &str) -> Result<Vec<String>>;

    /// Names of the direct child namespaces of `namespace`.
    async fn list_namespaces(&self, namespace: &str) -> Result<Vec<String>>;

    /// Create `name` below `parent`. With `idempotent` an existing namespace
    /// is not an error.
    async fn create_namespace(&self, parent: &str, name: &str, idempotent: bool) -> Result<()>;

    /// Mount a versioned key/value engine called `name` in `namespace`.
    async fn enable_engine(&self, namespace: &str, name: &str, idempotent: bool) -> Result<()>;

    /// Capabilities of the current token on a secret path.
    async fn capabilities(&self, namespace: &str, engine: &str, sub_path: &str)
        -> Result<Capability>;

    /// Base address of the store, used to build UI links.
    fn address(&self) -> Option<&str> {
        None
    }
}
