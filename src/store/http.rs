//! HTTP implementation of [`StoreClient`].
//!
//! KV v2 reads, lists, writes and engine mounts go through `vaultrs`, one
//! client per effective namespace. Mount listing, namespaces and
//! capabilities go through reqwest. The namespace header is always derived
//! from the configured base namespace and the namespace named by the caller.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, trace, Instrument};
use vaultrs::api::kv2::requests::ReadSecretRequest;
use vaultrs::api::kv2::responses::ReadSecretResponse;
use vaultrs::api::sys::requests::EnableEngineRequest;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;

use super::client::StoreClient;
use super::types::{Capability, SecretLeaf, SecretValue};
use crate::config::StoreConfig;
use crate::errors::{Result, VkvError};
use crate::store_span;
use crate::utils::join_namespace;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Authenticated HTTP client for the store.
#[derive(Clone)]
pub struct HttpStoreClient {
    client: Client,
    address: String,
    token: String,
    namespace: String,
    timeout: Duration,
    skip_tls_verify: bool,
    vault_clients: Arc<Mutex<HashMap<String, Arc<VaultClient>>>>,
}

impl std::fmt::Debug for HttpStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStoreClient")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl HttpStoreClient {
    /// Create a client for the given configuration.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        url::Url::parse(&config.address).map_err(|e| {
            VkvError::bad_input(format!("invalid store address '{}': {}", config.address, e))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .build()
            .map_err(|e| VkvError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            address: config.address.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            namespace: config.namespace.clone().unwrap_or_default(),
            timeout: config.timeout,
            skip_tls_verify: config.skip_tls_verify,
            vault_clients: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// The `vaultrs` client bound to `namespace` below the base namespace.
    fn vault(&self, namespace: &str) -> Result<Arc<VaultClient>> {
        let full = join_namespace(&self.namespace, namespace);
        let mut clients = self
            .vault_clients
            .lock()
            .map_err(|_| VkvError::internal("store client cache is poisoned"))?;
        if let Some(client) = clients.get(&full) {
            return Ok(Arc::clone(client));
        }

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder
            .address(&self.address)
            .token(&self.token)
            .timeout(Some(self.timeout))
            .verify(!self.skip_tls_verify);
        if !full.is_empty() {
            settings_builder.namespace(Some(full.clone()));
        }

        let settings = settings_builder
            .build()
            .map_err(|e| VkvError::bad_input(format!("invalid store settings: {}", e)))?;
        let client = VaultClient::new(settings)
            .map_err(|e| VkvError::transport(format!("failed to create store client: {}", e)))?;

        debug!(namespace = %full, "Created store client");
        let client = Arc::new(client);
        clients.insert(full, Arc::clone(&client));
        Ok(client)
    }

    fn url(&self, api_path: &str) -> String {
        format!("{}/v1/{}", self.address, api_path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, namespace: &str, api_path: &str) -> RequestBuilder {
        let url = self.url(api_path);
        debug!(method = %method, url = %url, "Store request");

        let builder = self.client.request(method, &url).header(TOKEN_HEADER, &self.token);
        let namespace = join_namespace(&self.namespace, namespace);
        if namespace.is_empty() {
            builder
        } else {
            builder.header(NAMESPACE_HEADER, namespace)
        }
    }

    async fn send(&self, builder: RequestBuilder, subject: &str) -> Result<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| VkvError::transport(format!("{}: {}", subject, e)))?;
        self.handle_response(response, subject).await
    }

    /// Check the status and decode the JSON body (`Null` for empty bodies).
    async fn handle_response(&self, response: Response, subject: &str) -> Result<Value> {
        let status = response.status();
        debug!(status = %status, subject = %subject, "Store response");

        let body = response
            .text()
            .await
            .map_err(|e| VkvError::transport(format!("{}: failed to read body: {}", subject, e)))?;

        if !status.is_success() {
            trace!("Error response:\n{}", body);
            return Err(classify_failure(status, &body, subject));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| VkvError::protocol(format!("{}: malformed response: {}", subject, e)))
    }
}

/// Map a non-success status and its response body onto the error taxonomy.
fn classify_failure(status: StatusCode, body: &str, subject: &str) -> VkvError {
    classify_status(status, &error_messages(body), subject)
}

fn classify_status(status: StatusCode, messages: &str, subject: &str) -> VkvError {
    match status {
        StatusCode::NOT_FOUND => VkvError::not_found(subject),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => VkvError::forbidden(subject),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT if is_conflict(messages) => {
            VkvError::conflict(format!("{}: {}", subject, messages))
        }
        _ => VkvError::protocol(format!("{}: status {}: {}", subject, status, messages)),
    }
}

/// Map a `vaultrs` failure onto the error taxonomy.
fn classify_vault_error(err: ClientError, subject: &str) -> VkvError {
    match err {
        ClientError::APIError { code, errors } => {
            classify_status(status_of(code), &errors.join("; "), subject)
        }
        ClientError::RestClientError { source } => match source {
            rustify::errors::ClientError::ServerResponseError { code, content } => {
                classify_failure(status_of(code), content.as_deref().unwrap_or_default(), subject)
            }
            rustify::errors::ClientError::RequestError { source, .. } => {
                VkvError::transport(format!("{}: {}", subject, source))
            }
            other => VkvError::protocol(format!("{}: {}", subject, other)),
        },
        e @ (ClientError::ResponseEmptyError
        | ClientError::ResponseDataEmptyError
        | ClientError::JsonParseError { .. }) => {
            VkvError::protocol(format!("{}: {}", subject, e))
        }
        other => VkvError::transport(format!("{}: {}", subject, other)),
    }
}

fn status_of(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_messages(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("errors").and_then(Value::as_array).cloned())
        .map(|errors| {
            errors.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("; ")
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn is_conflict(messages: &str) -> bool {
    let lower = messages.to_ascii_lowercase();
    lower.contains("already in use")
        || lower.contains("already exists")
        || lower.contains("existing mount")
}

fn kv_path(engine: &str, kind: &str, sub_path: &str) -> String {
    format!("{}/{}/{}", mount_of(engine), kind, sub_path.trim_start_matches('/'))
}

fn mount_of(engine: &str) -> &str {
    engine.trim_matches('/')
}

fn subject(namespace: &str, engine: &str, sub_path: &str) -> String {
    let path = format!("{}/{}", engine.trim_matches('/'), sub_path.trim_start_matches('/'));
    join_namespace(namespace, &path)
}

fn string_list(value: &Value, pointer: &str) -> Vec<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|keys| keys.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Turn a KV v2 data read into a leaf. Deleted versions carry no data.
pub(crate) fn leaf_from_response(
    response: ReadSecretResponse,
    subject: &str,
) -> Result<SecretLeaf> {
    let data = response.data.as_object().ok_or_else(|| VkvError::not_found(subject))?;

    let mut leaf = SecretLeaf::new(
        data.iter().map(|(k, v)| (k.clone(), SecretValue::from_json(v))).collect(),
    );
    leaf.version = Some(response.metadata.version);
    leaf.custom_metadata =
        response.metadata.custom_metadata.unwrap_or_default().into_iter().collect();
    Ok(leaf)
}

/// Pick the versioned key/value mounts out of a `sys/mounts` body.
pub(crate) fn parse_kv_mounts(body: &Value) -> Vec<String> {
    let mounts = body.get("data").and_then(Value::as_object).or_else(|| body.as_object());
    let mut engines: Vec<String> = mounts
        .into_iter()
        .flatten()
        .filter(|(_, mount)| {
            mount.get("type").and_then(Value::as_str) == Some("kv")
                && mount.pointer("/options/version").and_then(Value::as_str) == Some("2")
        })
        .map(|(name, _)| name.trim_end_matches('/').to_string())
        .collect();
    engines.sort();
    engines.dedup();
    engines
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn list(&self, namespace: &str, engine: &str, sub_path: &str) -> Result<Vec<String>> {
        let subject = subject(namespace, engine, sub_path);
        let span = store_span!("list", namespace, &subject);
        async {
            let vault = self.vault(namespace)?;
            let keys = vaultrs::kv2::list(&*vault, mount_of(engine), sub_path)
                .await
                .map_err(|e| classify_vault_error(e, &subject))?;
            if keys.is_empty() {
                return Err(VkvError::not_found(subject.clone()));
            }
            Ok(keys)
        }
        .instrument(span)
        .await
    }

    async fn read(&self, namespace: &str, engine: &str, sub_path: &str) -> Result<SecretLeaf> {
        let subject = subject(namespace, engine, sub_path);
        let span = store_span!("read", namespace, &subject);
        async {
            let vault = self.vault(namespace)?;
            let endpoint = ReadSecretRequest::builder()
                .mount(mount_of(engine))
                .path(sub_path.trim_start_matches('/'))
                .build()
                .map_err(|e| VkvError::internal(format!("{}: {}", subject, e)))?;
            let response = vaultrs::api::exec_with_result(&*vault, endpoint)
                .await
                .map_err(|e| classify_vault_error(e, &subject))?;
            leaf_from_response(response, &subject)
        }
        .instrument(span)
        .await
    }

    async fn write(
        &self,
        namespace: &str,
        engine: &str,
        sub_path: &str,
        data: &BTreeMap<String, SecretValue>,
    ) -> Result<u64> {
        let subject = subject(namespace, engine, sub_path);
        let span = store_span!("write", namespace, &subject);
        async {
            let vault = self.vault(namespace)?;
            let path = sub_path.trim_start_matches('/');
            let metadata = vaultrs::kv2::set(&*vault, mount_of(engine), path, data)
                .await
                .map_err(|e| classify_vault_error(e, &subject))?;
            Ok(metadata.version)
        }
        .instrument(span)
        .await
    }

    async fn list_engines(&self, namespace: &str) -> Result<Vec<String>> {
        let subject = join_namespace(namespace, "sys/mounts");
        let span = store_span!("list_engines", namespace, &subject);
        async {
            let builder = self.request(Method::GET, namespace, "sys/mounts");
            let body = self.send(builder, &subject).await?;
            Ok(parse_kv_mounts(&body))
        }
        .instrument(span)
        .await
    }

    async fn list_namespaces(&self, namespace: &str) -> Result<Vec<String>> {
        let subject = join_namespace(namespace, "sys/namespaces");
        let span = store_span!("list_namespaces", namespace, &subject);
        async {
            let builder =
                self.request(Method::GET, namespace, "sys/namespaces").query(&[("list", "true")]);
            match self.send(builder, &subject).await {
                Ok(body) => {
                    let mut names: Vec<String> = string_list(&body, "/data/keys")
                        .into_iter()
                        .map(|k| k.trim_end_matches('/').to_string())
                        .filter(|k| !k.is_empty())
                        .collect();
                    names.sort();
                    Ok(names)
                }
                Err(VkvError::NotFound { .. }) => Ok(Vec::new()),
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    async fn create_namespace(&self, parent: &str, name: &str, idempotent: bool) -> Result<()> {
        let subject = join_namespace(parent, name);
        let span = store_span!("create_namespace", parent, &subject);
        async {
            let api_path = format!("sys/namespaces/{}", name.trim_matches('/'));
            match self.send(self.request(Method::POST, parent, &api_path), &subject).await {
                Ok(_) => Ok(()),
                Err(VkvError::Conflict { .. }) if idempotent => {
                    debug!(namespace = %subject, "Namespace already exists");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    async fn enable_engine(&self, namespace: &str, name: &str, idempotent: bool) -> Result<()> {
        let subject = join_namespace(namespace, name);
        let span = store_span!("enable_engine", namespace, &subject);
        async {
            let vault = self.vault(namespace)?;
            let mut options = EnableEngineRequest::builder();
            options.options(HashMap::from([("version".to_string(), "2".to_string())]));
            let mount = mount_of(name);
            let enabled = vaultrs::sys::mount::enable(&*vault, mount, "kv", Some(&mut options))
                .await
                .map_err(|e| classify_vault_error(e, &subject));
            match enabled {
                Ok(_) => Ok(()),
                Err(VkvError::Conflict { .. }) if idempotent => {
                    debug!(engine = %subject, "Engine already enabled");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    async fn capabilities(
        &self,
        namespace: &str,
        engine: &str,
        sub_path: &str,
    ) -> Result<Capability> {
        let subject = subject(namespace, engine, sub_path);
        let span = store_span!("capabilities", namespace, &subject);
        async {
            let data_path = kv_path(engine, "data", sub_path);
            let metadata_path = kv_path(engine, "metadata", sub_path);
            let builder = self
                .request(Method::POST, namespace, "sys/capabilities-self")
                .json(&json!({ "paths": [data_path, metadata_path] }));
            let body = self.send(builder, &subject).await?;

            let lookup = |path: &str| -> Capability {
                let pointer = format!("/data/{}", path.replace('~', "~0").replace('/', "~1"));
                let names: Vec<String> = body
                    .get(path)
                    .or_else(|| body.pointer(&pointer))
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                Capability::from_names(&names)
            };

            let cap = lookup(&data_path).union(lookup(&metadata_path));
            Ok(cap)
        }
        .instrument(span)
        .await
    }

    fn address(&self) -> Option<&str> {
        Some(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_validates_address() {
        assert!(HttpStoreClient::new(&StoreConfig::new("not a url", "t")).is_err());
        let config = StoreConfig::new("http://127.0.0.1:8200/", "t");
        let client = HttpStoreClient::new(&config).unwrap();
        assert_eq!(client.address(), Some("http://127.0.0.1:8200"));
        assert_eq!(client.url("sys/mounts"), "http://127.0.0.1:8200/v1/sys/mounts");
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = HttpStoreClient::new(&StoreConfig::new("http://x:1", "s.hidden")).unwrap();
        assert!(!format!("{:?}", client).contains("s.hidden"));
    }

    #[test]
    fn test_kv_paths() {
        assert_eq!(kv_path("kv", "data", "app/db"), "kv/data/app/db");
        assert_eq!(kv_path("kv/", "metadata", ""), "kv/metadata/");
        assert_eq!(kv_path("engine/path", "data", "/admin"), "engine/path/data/admin");
        assert_eq!(subject("team", "kv", "app"), "team/kv/app");
        assert_eq!(subject("", "kv", ""), "kv/");
    }

    #[test]
    fn test_classify_failure() {
        let conflict = r#"{"errors":["path is already in use at kv/"]}"#;
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, conflict, "kv"),
            VkvError::Conflict { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, r#"{"errors":["bad"]}"#, "kv"),
            VkvError::Protocol { .. }
        ));
        assert_eq!(classify_failure(StatusCode::NOT_FOUND, "", "kv").kind(), "not-found");
        assert_eq!(classify_failure(StatusCode::FORBIDDEN, "", "kv").kind(), "forbidden");
        assert!(matches!(
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "oops", "kv"),
            VkvError::Protocol { .. }
        ));
    }

    fn read_response(data: Value, version: u64) -> ReadSecretResponse {
        serde_json::from_value(json!({
            "data": data,
            "metadata": {
                "created_time": "2024-01-01T00:00:00Z",
                "deletion_time": "",
                "custom_metadata": { "owner": "team-a" },
                "destroyed": false,
                "version": version
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_leaf_from_response() {
        let response = read_response(json!({ "user": "admin", "port": 5432 }), 3);
        let leaf = leaf_from_response(response, "kv/db").unwrap();
        assert_eq!(leaf.version, Some(3));
        assert_eq!(leaf.data["user"], SecretValue::from("admin"));
        assert_eq!(leaf.data["port"].to_string(), "5432");
        assert_eq!(leaf.custom_metadata["owner"], "team-a");

        let deleted = read_response(Value::Null, 2);
        assert!(matches!(leaf_from_response(deleted, "kv/db"), Err(VkvError::NotFound { .. })));
    }

    #[test]
    fn test_classify_vault_error() {
        let denied = ClientError::APIError { code: 403, errors: vec!["permission denied".into()] };
        assert_eq!(classify_vault_error(denied, "kv/db").kind(), "forbidden");

        let in_use = ClientError::APIError {
            code: 400,
            errors: vec!["path is already in use at kv/".into()],
        };
        assert_eq!(classify_vault_error(in_use, "kv").kind(), "conflict");

        let missing = ClientError::RestClientError {
            source: rustify::errors::ClientError::ServerResponseError {
                code: 404,
                content: Some(String::new()),
            },
        };
        assert_eq!(classify_vault_error(missing, "kv/x").kind(), "not-found");
        assert_eq!(classify_vault_error(ClientError::ResponseEmptyError, "kv").kind(), "protocol");
    }

    #[test]
    fn test_vault_clients_are_cached_per_namespace() {
        let client = HttpStoreClient::new(
            &StoreConfig::new("http://127.0.0.1:8200", "t").with_namespace("root"),
        )
        .unwrap();
        let first = client.vault("team").unwrap();
        let again = client.vault("team").unwrap();
        let other = client.vault("").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(client.vault_clients.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_kv_mounts_filters_kind() {
        let body = json!({
            "data": {
                "kv/": { "type": "kv", "options": { "version": "2" } },
                "old/": { "type": "kv", "options": { "version": "1" } },
                "sys/": { "type": "system", "options": null },
                "team/kv/": { "type": "kv", "options": { "version": "2" } }
            }
        });
        assert_eq!(parse_kv_mounts(&body), vec!["kv", "team/kv"]);
    }
}
