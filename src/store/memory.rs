//! In-process [`StoreClient`] used by tests and for local experiments.
//!
//! Mirrors the store's observable behaviour: listing an empty or missing
//! path is `not-found`, engines and namespaces must exist before use, and
//! every write bumps the leaf version.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::client::StoreClient;
use super::types::{Capability, SecretLeaf, SecretValue};
use crate::errors::{Result, VkvError};
use crate::utils::join_namespace;

#[derive(Debug, Default)]
struct MemoryNamespace {
    engines: BTreeMap<String, BTreeMap<String, SecretLeaf>>,
}

#[derive(Debug)]
struct MemoryState {
    namespaces: BTreeMap<String, MemoryNamespace>,
    denied: BTreeSet<String>,
    capabilities: BTreeMap<String, Capability>,
}

impl Default for MemoryState {
    fn default() -> Self {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(String::new(), MemoryNamespace::default());
        Self { namespaces, denied: BTreeSet::new(), capabilities: BTreeMap::new() }
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    address: Option<String>,
}

fn full_path(namespace: &str, engine: &str, sub_path: &str) -> String {
    let path = format!("{}/{}", engine.trim_matches('/'), sub_path.trim_matches('/'));
    join_namespace(namespace, path.trim_end_matches('/'))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `address` from [`StoreClient::address`].
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| VkvError::internal("in-memory store lock poisoned"))
    }

    /// Store a leaf, creating its namespace chain and engine on demand.
    pub fn put(
        &self,
        namespace: &str,
        engine: &str,
        sub_path: &str,
        leaf: SecretLeaf,
    ) -> Result<()> {
        let mut state = self.state()?;
        let mut current = String::new();
        for segment in namespace.split('/').filter(|s| !s.is_empty()) {
            current = join_namespace(&current, segment);
            state.namespaces.entry(current.clone()).or_default();
        }
        let ns = state.namespaces.entry(namespace.trim_matches('/').to_string()).or_default();
        let engine = ns.engines.entry(engine.trim_matches('/').to_string()).or_default();
        let previous = engine.get(sub_path.trim_matches('/')).and_then(|l| l.version).unwrap_or(0);
        let version = leaf.version.unwrap_or(previous + 1);
        engine.insert(sub_path.trim_matches('/').to_string(), leaf.with_version(version));
        Ok(())
    }

    /// Make every call touching exactly this path fail with `forbidden`.
    pub fn deny(&self, namespace: &str, engine: &str, sub_path: &str) -> Result<()> {
        self.state()?.denied.insert(full_path(namespace, engine, sub_path));
        Ok(())
    }

    /// Override the capabilities reported for a path (default: root).
    pub fn set_capabilities(
        &self,
        namespace: &str,
        engine: &str,
        sub_path: &str,
        capability: Capability,
    ) -> Result<()> {
        self.state()?.capabilities.insert(full_path(namespace, engine, sub_path), capability);
        Ok(())
    }

    /// Snapshot of every leaf of an engine, keyed by engine-relative path.
    pub fn leaves(&self, namespace: &str, engine: &str) -> Result<BTreeMap<String, SecretLeaf>> {
        let state = self.state()?;
        Ok(state
            .namespaces
            .get(namespace.trim_matches('/'))
            .and_then(|ns| ns.engines.get(engine.trim_matches('/')))
            .cloned()
            .unwrap_or_default())
    }

    /// Whether a namespace exists.
    pub fn has_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.state()?.namespaces.contains_key(namespace.trim_matches('/')))
    }

    fn check_denied(
        state: &MemoryState,
        namespace: &str,
        engine: &str,
        sub_path: &str,
    ) -> Result<()> {
        let path = full_path(namespace, engine, sub_path);
        if state.denied.contains(&path) {
            return Err(VkvError::forbidden(path));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn list(&self, namespace: &str, engine: &str, sub_path: &str) -> Result<Vec<String>> {
        let state = self.state()?;
        Self::check_denied(&state, namespace, engine, sub_path)?;
        let path = full_path(namespace, engine, sub_path);
        let leaves = state
            .namespaces
            .get(namespace.trim_matches('/'))
            .and_then(|ns| ns.engines.get(engine.trim_matches('/')))
            .ok_or_else(|| VkvError::not_found(path.clone()))?;

        let prefix = match sub_path.trim_matches('/') {
            "" => String::new(),
            trimmed => format!("{}/", trimmed),
        };
        let children: BTreeSet<String> = leaves
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty())
            .map(|rest| match rest.find('/') {
                Some(idx) => rest[..=idx].to_string(),
                None => rest.to_string(),
            })
            .collect();

        if children.is_empty() {
            return Err(VkvError::not_found(path));
        }
        Ok(children.into_iter().collect())
    }

    async fn read(&self, namespace: &str, engine: &str, sub_path: &str) -> Result<SecretLeaf> {
        let state = self.state()?;
        Self::check_denied(&state, namespace, engine, sub_path)?;
        state
            .namespaces
            .get(namespace.trim_matches('/'))
            .and_then(|ns| ns.engines.get(engine.trim_matches('/')))
            .and_then(|leaves| leaves.get(sub_path.trim_matches('/')))
            .cloned()
            .ok_or_else(|| VkvError::not_found(full_path(namespace, engine, sub_path)))
    }

    async fn write(
        &self,
        namespace: &str,
        engine: &str,
        sub_path: &str,
        data: &BTreeMap<String, SecretValue>,
    ) -> Result<u64> {
        let mut state = self.state()?;
        Self::check_denied(&state, namespace, engine, sub_path)?;
        let path = full_path(namespace, engine, sub_path);
        let leaves = state
            .namespaces
            .get_mut(namespace.trim_matches('/'))
            .and_then(|ns| ns.engines.get_mut(engine.trim_matches('/')))
            .ok_or_else(|| VkvError::not_found(path))?;

        let key = sub_path.trim_matches('/').to_string();
        let version = leaves.get(&key).and_then(|l| l.version).unwrap_or(0) + 1;
        let custom_metadata =
            leaves.get(&key).map(|l| l.custom_metadata.clone()).unwrap_or_default();
        leaves.insert(
            key,
            SecretLeaf { data: data.clone(), version: Some(version), custom_metadata },
        );
        Ok(version)
    }

    async fn list_engines(&self, namespace: &str) -> Result<Vec<String>> {
        let state = self.state()?;
        state
            .namespaces
            .get(namespace.trim_matches('/'))
            .map(|ns| ns.engines.keys().cloned().collect())
            .ok_or_else(|| VkvError::not_found(format!("namespace '{}'", namespace)))
    }

    async fn list_namespaces(&self, namespace: &str) -> Result<Vec<String>> {
        let state = self.state()?;
        let parent = namespace.trim_matches('/');
        let prefix = if parent.is_empty() { String::new() } else { format!("{}/", parent) };
        Ok(state
            .namespaces
            .keys()
            .filter_map(|name| name.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    async fn create_namespace(&self, parent: &str, name: &str, idempotent: bool) -> Result<()> {
        let mut state = self.state()?;
        let parent = parent.trim_matches('/');
        if !state.namespaces.contains_key(parent) {
            return Err(VkvError::not_found(format!("namespace '{}'", parent)));
        }
        let full = join_namespace(parent, name);
        if state.namespaces.contains_key(&full) {
            if idempotent {
                return Ok(());
            }
            return Err(VkvError::conflict(format!("namespace '{}' already exists", full)));
        }
        state.namespaces.insert(full, MemoryNamespace::default());
        Ok(())
    }

    async fn enable_engine(&self, namespace: &str, name: &str, idempotent: bool) -> Result<()> {
        let mut state = self.state()?;
        let ns = state
            .namespaces
            .get_mut(namespace.trim_matches('/'))
            .ok_or_else(|| VkvError::not_found(format!("namespace '{}'", namespace)))?;
        let name = name.trim_matches('/');
        if ns.engines.contains_key(name) {
            if idempotent {
                return Ok(());
            }
            return Err(VkvError::conflict(format!(
                "path is already in use at {}/",
                join_namespace(namespace, name)
            )));
        }
        ns.engines.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn capabilities(
        &self,
        namespace: &str,
        engine: &str,
        sub_path: &str,
    ) -> Result<Capability> {
        let state = self.state()?;
        Ok(state
            .capabilities
            .get(&full_path(namespace, engine, sub_path))
            .copied()
            .unwrap_or_else(Capability::root))
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(pairs: &[(&str, &str)]) -> SecretLeaf {
        SecretLeaf::from_pairs(pairs.iter().map(|(k, v)| (*k, *v)))
    }

    #[tokio::test]
    async fn test_list_returns_one_level() {
        let store = InMemoryStore::new();
        store.put("", "kv", "app/db", leaf(&[("user", "admin")])).unwrap();
        store.put("", "kv", "app/cache/redis", leaf(&[("pw", "x")])).unwrap();
        store.put("", "kv", "top", leaf(&[("k", "v")])).unwrap();

        assert_eq!(store.list("", "kv", "").await.unwrap(), vec!["app/", "top"]);
        assert_eq!(store.list("", "kv", "app/").await.unwrap(), vec!["cache/", "db"]);
        assert!(matches!(store.list("", "kv", "top").await, Err(VkvError::NotFound { .. })));
        assert!(matches!(store.list("", "missing", "").await, Err(VkvError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_write_bumps_version() {
        let store = InMemoryStore::new();
        store.enable_engine("", "kv", false).await.unwrap();
        let data = leaf(&[("a", "1")]).data;
        assert_eq!(store.write("", "kv", "x", &data).await.unwrap(), 1);
        assert_eq!(store.write("", "kv", "x", &data).await.unwrap(), 2);
        assert_eq!(store.read("", "kv", "x").await.unwrap().version, Some(2));
    }

    #[tokio::test]
    async fn test_write_requires_engine() {
        let store = InMemoryStore::new();
        let data = leaf(&[("a", "1")]).data;
        assert!(matches!(store.write("", "kv", "x", &data).await, Err(VkvError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_namespaces_and_engines() {
        let store = InMemoryStore::new();
        store.create_namespace("", "team", false).await.unwrap();
        store.create_namespace("team", "prod", false).await.unwrap();
        assert!(matches!(
            store.create_namespace("", "team", false).await,
            Err(VkvError::Conflict { .. })
        ));
        store.create_namespace("", "team", true).await.unwrap();

        assert_eq!(store.list_namespaces("").await.unwrap(), vec!["team"]);
        assert_eq!(store.list_namespaces("team").await.unwrap(), vec!["prod"]);

        store.enable_engine("team/prod", "kv", false).await.unwrap();
        assert!(matches!(
            store.enable_engine("team/prod", "kv", false).await,
            Err(VkvError::Conflict { .. })
        ));
        store.enable_engine("team/prod", "kv", true).await.unwrap();
        assert_eq!(store.list_engines("team/prod").await.unwrap(), vec!["kv"]);
    }

    #[tokio::test]
    async fn test_deny_and_capabilities() {
        let store = InMemoryStore::new();
        store.put("", "kv", "secret", leaf(&[("k", "v")])).unwrap();
        store.deny("", "kv", "secret").unwrap();
        assert!(matches!(store.read("", "kv", "secret").await, Err(VkvError::Forbidden { .. })));

        assert!(store.capabilities("", "kv", "secret").await.unwrap().root);
        store
            .set_capabilities("", "kv", "secret", Capability::from_names(&["read"]))
            .unwrap();
        assert!(!store.capabilities("", "kv", "secret").await.unwrap().root);
    }
}
