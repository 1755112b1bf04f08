//! # Import Engine
//!
//! Writes a YAML or JSON tree (usually the output of an export) into an
//! engine, optionally previewing the merge first.

use std::io::Write;

use tracing::{debug, info};

use crate::errors::{Result, VkvError};
use crate::projection::{deep_merge, flatten};
use crate::render::{OutputFormat, RenderOptions, Renderer};
use crate::store::{FlatSecrets, Node, SecretLeaf, SecretValue, StoreClient, Tree};
use crate::utils::{dir_path, last_segment, parent_dir, path_cmp};
use crate::walker::walk_subtree;

/// Parse a document as JSON, falling back to YAML.
pub fn parse_document(bytes: &[u8]) -> Result<serde_json::Value> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_slice(bytes).map_err(|yaml_err| {
            VkvError::bad_input(format!(
                "payload is neither JSON ({}) nor YAML ({})",
                json_err, yaml_err
            ))
        }),
    }
}

/// Parse an import payload into a tree relative to `engine/sub_path`.
///
/// The root label of an export of the destination itself is stripped.
pub fn parse_payload(bytes: &[u8], engine: &str, sub_path: &str) -> Result<Tree> {
    Ok(rebase(Tree::from_json(&parse_document(bytes)?)?, engine, sub_path))
}

/// Strip the root label of an export of the destination itself.
///
/// Only a sole top-level directory named `engine/` or `engine/sub_path/`
/// is stripped; any other directory is imported as a directory.
fn rebase(tree: Tree, engine: &str, sub_path: &str) -> Tree {
    let engine = engine.trim_matches('/');
    let sub = sub_path.trim_matches('/');
    let labels = [format!("{}/", engine), format!("{}/{}/", engine, sub)];

    if tree.len() == 1 {
        if let Some((key, Node::Dir(inner))) = tree.iter().next() {
            if labels.iter().any(|label| label == key) {
                return inner.clone();
            }
        }
    }
    tree
}

/// A document whose values are all scalars is the data of one secret.
fn single_leaf(document: &serde_json::Value) -> Option<SecretLeaf> {
    let object = document.as_object()?;
    if object.is_empty() || object.values().any(|v| v.is_object()) {
        return None;
    }
    Some(SecretLeaf::new(
        object.iter().map(|(k, v)| (k.clone(), SecretValue::from_json(v))).collect(),
    ))
}

/// Resolve the payload against the destination sub-path.
///
/// Returns the directory the tree hangs off and the tree itself. A
/// single-secret payload is written as the leaf named by `sub_path`.
fn destination_tree(
    document: &serde_json::Value,
    engine: &str,
    sub_path: &str,
) -> Result<(String, Tree)> {
    match single_leaf(document) {
        Some(leaf) => {
            let target = sub_path.trim_matches('/');
            if target.is_empty() {
                return Err(VkvError::bad_input(
                    "a payload holding a single secret needs a destination path",
                ));
            }
            dir_path(target)?;
            let mut tree = Tree::new();
            tree.insert_leaf(last_segment(target), leaf);
            Ok((parent_dir(target), tree))
        }
        None => {
            let tree = rebase(Tree::from_json(document)?, engine, sub_path);
            Ok((dir_path(sub_path)?, tree))
        }
    }
}

/// Flatten a tree into writable entries, in write order.
///
/// Fails when a path has an empty segment or a key contains `/`.
pub fn writable_entries(tree: &Tree) -> Result<Vec<(String, SecretLeaf)>> {
    let flat: FlatSecrets = flatten(tree);
    let mut entries: Vec<_> = flat.into_iter().collect();
    entries.sort_by(|a, b| path_cmp(&a.0, &b.0));

    for (path, leaf) in &entries {
        dir_path(path)?;
        if let Some(key) = leaf.data.keys().find(|k| k.contains('/')) {
            return Err(VkvError::bad_input(format!(
                "key '{}' at '{}' contains '/', which the store does not allow",
                key, path
            )));
        }
    }
    Ok(entries)
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Write into an engine that already has contents.
    pub force: bool,
    /// Preview the merged result without writing.
    pub dry_run: bool,
    /// Print neither progress nor the final tree.
    pub silent: bool,
    /// Masking used for the preview and the final tree.
    pub show_values: bool,
    pub max_value_length: i64,
}

impl ImportOptions {
    pub fn validate(&self) -> Result<()> {
        if self.force && self.dry_run {
            return Err(VkvError::bad_option_combo("cannot specify both --force and --dry-run"));
        }
        if self.silent && self.dry_run {
            return Err(VkvError::bad_option_combo("cannot specify both --silent and --dry-run"));
        }
        Ok(())
    }

    fn renderer(&self) -> Result<Renderer> {
        Renderer::new(RenderOptions {
            format: OutputFormat::Tree,
            show_values: self.show_values,
            max_value_length: self.max_value_length,
            ..RenderOptions::default()
        })
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Engine-relative paths written, in write order.
    pub written: Vec<String>,
}

/// Import `payload` into `engine` below `sub_path` in `namespace`.
///
/// The rendered preview or final tree goes to `output`; one progress note
/// per written leaf goes to `progress`.
#[allow(clippy::too_many_arguments)]
pub async fn import<C>(
    client: &C,
    namespace: &str,
    engine: &str,
    sub_path: &str,
    payload: &[u8],
    options: &ImportOptions,
    output: &mut dyn Write,
    progress: &mut dyn Write,
) -> Result<ImportReport>
where
    C: StoreClient + ?Sized,
{
    options.validate()?;
    let renderer = options.renderer()?;
    let (base, tree) = destination_tree(&parse_document(payload)?, engine, sub_path)?;
    let entries = writable_entries(&tree)?;
    debug!(engine = %engine, base = %base, leaves = entries.len(), "Parsed import payload");

    if options.dry_run {
        let existing = match walk_subtree(client, namespace, engine, &base, false).await {
            Ok(existing) => existing,
            Err(VkvError::NotFound { .. }) => Tree::new(),
            Err(e) => return Err(e),
        };
        let merged = deep_merge(&tree, &existing);
        renderer.render_to(output, engine, &base, &merged)?;
        return Ok(ImportReport::default());
    }

    if !options.force && engine_has_contents(client, namespace, engine).await? {
        return Err(VkvError::conflict(format!(
            "engine '{}' already has secrets, use --force to write into it",
            engine
        )));
    }
    client.enable_engine(namespace, engine, options.force).await?;

    let mut report = ImportReport::default();
    for (path, leaf) in entries {
        let destination = format!("{}{}", base, path);
        let version = client.write(namespace, engine, &destination, &leaf.data).await?;
        info!(engine = %engine, path = %destination, version, "Imported secret");
        if !options.silent {
            let full = format!("{}/{}", engine.trim_matches('/'), destination);
            writeln!(progress, "wrote {} (version {})", full, version)
                .map_err(|e| VkvError::io("progress", e))?;
        }
        report.written.push(destination);
    }

    if !options.silent {
        let stored = walk_subtree(client, namespace, engine, &base, false).await?;
        renderer.render_to(output, engine, &base, &stored)?;
    }
    Ok(report)
}

async fn engine_has_contents<C>(client: &C, namespace: &str, engine: &str) -> Result<bool>
where
    C: StoreClient + ?Sized,
{
    let engines = client.list_engines(namespace).await?;
    if !engines.iter().any(|e| e.trim_matches('/') == engine.trim_matches('/')) {
        return Ok(false);
    }
    match client.list(namespace, engine, "").await {
        Ok(children) => Ok(!children.is_empty()),
        Err(VkvError::NotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::lookup;
    use crate::store::InMemoryStore;

    fn opts() -> ImportOptions {
        ImportOptions { max_value_length: 12, ..ImportOptions::default() }
    }

    #[test]
    fn test_parse_payload_json_and_yaml() {
        let json =
            parse_payload(br#"{"kv/": {"app/": {"db": {"user": "admin"}}}}"#, "kv", "").unwrap();
        assert!(lookup(&json, "app/db").is_some());

        let yaml =
            parse_payload(b"app/:\n  db:\n    user: admin\ntop:\n  k: v\n", "kv", "").unwrap();
        assert!(lookup(&yaml, "app/db").is_some());
        assert!(lookup(&yaml, "top").is_some());

        let err = parse_payload(b"{not: [valid", "kv", "").unwrap_err();
        assert_eq!(err.kind(), "bad-input");
    }

    #[test]
    fn test_only_destination_root_is_stripped() {
        let app = parse_payload(br#"{"app/": {"db": {"u": "x"}}}"#, "kv", "").unwrap();
        assert!(lookup(&app, "app/db").is_some());

        let sub = parse_payload(br#"{"kv/team/": {"db": {"u": "x"}}}"#, "kv", "team").unwrap();
        assert!(lookup(&sub, "db").is_some());

        let other = parse_payload(br#"{"yaml/": {"db": {"u": "x"}}}"#, "kv", "").unwrap();
        assert!(lookup(&other, "yaml/db").is_some());

        let nested = parse_payload(br#"{"kv/": {"db": {"u": "x"}}}"#, "engine/path", "").unwrap();
        assert!(lookup(&nested, "kv/db").is_some());
    }

    #[tokio::test]
    async fn test_single_directory_keeps_its_level() {
        let store = InMemoryStore::new();
        let options = ImportOptions { silent: true, ..opts() };
        let mut sink = Vec::new();
        let mut progress = Vec::new();
        let payload = br#"{"app/": {"db": {"user": "admin"}}}"#;
        let report = import(&store, "", "kv", "", payload, &options, &mut sink, &mut progress)
            .await
            .unwrap();
        assert_eq!(report.written, vec!["app/db"]);
    }

    #[test]
    fn test_keys_with_slash_rejected() {
        let tree = parse_payload(br#"{"leaf": {"a/b": "x"}}"#, "kv", "").unwrap();
        assert_eq!(writable_entries(&tree).unwrap_err().kind(), "bad-input");
    }

    #[test]
    fn test_option_conflicts() {
        let both = ImportOptions { force: true, dry_run: true, ..opts() };
        assert_eq!(both.validate().unwrap_err().kind(), "bad-option-combo");
        let silent = ImportOptions { silent: true, dry_run: true, ..opts() };
        assert_eq!(silent.validate().unwrap_err().kind(), "bad-option-combo");
    }

    #[tokio::test]
    async fn test_import_writes_and_reports() {
        let store = InMemoryStore::new();
        let mut out = Vec::new();
        let mut progress = Vec::new();
        let report = import(
            &store,
            "",
            "kv",
            "",
            br#"{"kv/": {"app/": {"db": {"user": "admin"}}, "top": {"k": "v"}}}"#,
            &opts(),
            &mut out,
            &mut progress,
        )
        .await
        .unwrap();

        assert_eq!(report.written, vec!["app/db", "top"]);
        assert_eq!(store.leaves("", "kv").unwrap().len(), 2);
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("kv/\n"));
        assert!(out.contains("user=*****"));
        assert_eq!(String::from_utf8(progress).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_import_conflict_without_force() {
        let store = InMemoryStore::new();
        store.put("", "kv", "old", SecretLeaf::from_pairs([("k", "v")])).unwrap();
        let payload = br#"{"new": {"k": "v"}}"#;
        let mut sink = Vec::new();
        let mut progress = Vec::new();

        let err = import(&store, "", "kv", "", payload, &opts(), &mut sink, &mut progress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");

        let forced = ImportOptions { force: true, silent: true, ..opts() };
        import(&store, "", "kv", "", payload, &forced, &mut sink, &mut progress).await.unwrap();
        assert_eq!(store.leaves("", "kv").unwrap().len(), 2);
        assert!(sink.is_empty());
        assert!(progress.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_previews_merge_without_writing() {
        let store = InMemoryStore::new();
        store.put("", "kv", "old", SecretLeaf::from_pairs([("k", "v")])).unwrap();
        let options = ImportOptions { dry_run: true, show_values: true, ..opts() };
        let mut out = Vec::new();
        let mut progress = Vec::new();

        import(&store, "", "kv", "", br#"{"new": {"n": "1"}}"#, &options, &mut out, &mut progress)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "kv/\n├── new\n│   └── n=1\n└── old\n    └── k=v\n");
        assert_eq!(store.leaves("", "kv").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_secret_payload_becomes_leaf() {
        let store = InMemoryStore::new();
        let options = ImportOptions { silent: true, ..opts() };
        let mut sink = Vec::new();
        let mut progress = Vec::new();
        let report = import(
            &store,
            "",
            "engine/path",
            "team/admin",
            br#"{"sub": "password"}"#,
            &options,
            &mut sink,
            &mut progress,
        )
        .await
        .unwrap();

        assert_eq!(report.written, vec!["team/admin"]);
        let leaves = store.leaves("", "engine/path").unwrap();
        assert_eq!(leaves["team/admin"].data["sub"].to_string(), "password");

        let err = import(&store, "", "kv", "", br#"{"k": "v"}"#, &options, &mut sink, &mut progress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "bad-input");
    }

    #[tokio::test]
    async fn test_import_below_sub_path() {
        let store = InMemoryStore::new();
        let mut sink = Vec::new();
        let mut progress = Vec::new();
        let options = ImportOptions { silent: true, ..opts() };
        let payload = br#"{"db": {"u": "x"}}"#;
        import(&store, "", "kv", "team/a", payload, &options, &mut sink, &mut progress)
            .await
            .unwrap();
        assert!(store.leaves("", "kv").unwrap().contains_key("team/a/db"));
    }
}
