//! Export CLI command
//!
//! Walks one engine subtree and renders it in any of the output formats.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::projection::flatten;
use crate::render::{
    root_label, template_source, OutputFormat, RenderOptions, Renderer, DEFAULT_MAX_VALUE_LENGTH,
};
use crate::store::{Capability, StoreClient, Tree};
use crate::utils::resolve_target;
use crate::walker::walk_subtree_located;

#[derive(Args, Debug, Clone)]
#[command(
    after_help = "EXAMPLES:\n    # Masked tree view of an engine\n    vkv export -p secret\n\n    # Shell exports with real values\n    vkv export -p secret/app -f export --show-values\n\n    # Engine mounted at a path containing '/'\n    vkv export -e team/kv -f json"
)]
pub struct ExportArgs {
    /// Engine and sub-path, e.g. `secret/app/db`
    #[arg(short, long, env = "VKV_EXPORT_PATH", value_name = "PATH")]
    pub path: Option<String>,

    /// Engine path, for engines whose mount contains '/'
    #[arg(short, long, env = "VKV_EXPORT_ENGINE_PATH", value_name = "ENGINE")]
    pub engine_path: Option<String>,

    /// Show only the keys
    #[arg(long, env = "VKV_EXPORT_ONLY_KEYS")]
    pub only_keys: bool,

    /// Show only the paths
    #[arg(long, env = "VKV_EXPORT_ONLY_PATHS")]
    pub only_paths: bool,

    /// Show values instead of masking them
    #[arg(long, env = "VKV_EXPORT_SHOW_VALUES")]
    pub show_values: bool,

    /// Show the version of every secret
    #[arg(long, env = "VKV_EXPORT_SHOW_VERSION")]
    pub show_version: bool,

    /// Show the custom metadata of every secret
    #[arg(long, env = "VKV_EXPORT_SHOW_METADATA")]
    pub show_metadata: bool,

    /// Cap for masked and shown values, -1 disables it
    #[arg(
        long,
        env = "VKV_EXPORT_MAX_VALUE_LENGTH",
        default_value_t = DEFAULT_MAX_VALUE_LENGTH,
        allow_negative_numbers = true,
        value_name = "N"
    )]
    pub max_value_length: i64,

    /// Template file for the template format
    #[arg(long, env = "VKV_EXPORT_TEMPLATE_FILE", value_name = "FILE")]
    pub template_file: Option<PathBuf>,

    /// Inline template for the template format
    #[arg(long, env = "VKV_EXPORT_TEMPLATE_STRING", value_name = "TEMPLATE")]
    pub template_string: Option<String>,

    /// Output format
    #[arg(
        short,
        long,
        env = "VKV_EXPORT_FORMAT",
        default_value = "base",
        value_parser = OutputFormat::NAMES
    )]
    pub format: String,

    /// Uppercase variable names in the export format
    #[arg(long, env = "VKV_EXPORT_EXPORT_UPPER")]
    pub export_upper: bool,

    /// Prefix variable names with the secret path in the export format
    #[arg(long, env = "VKV_EXPORT_EXPORT_INCLUDE_PATH")]
    pub export_include_path: bool,
}

impl ExportArgs {
    fn render_options(&self, color: bool) -> Result<RenderOptions> {
        let template =
            template_source(self.template_string.clone(), self.template_file.as_deref())?;
        Ok(RenderOptions {
            format: self.format.parse()?,
            only_keys: self.only_keys,
            only_paths: self.only_paths,
            show_values: self.show_values,
            max_value_length: self.max_value_length,
            show_version: self.show_version,
            show_metadata: self.show_metadata,
            template,
            export_upper: self.export_upper,
            export_include_path: self.export_include_path,
            color,
        })
    }

    pub fn request(&self, color: bool) -> Result<ExportRequest> {
        Ok(ExportRequest {
            path: self.path.clone(),
            engine_path: self.engine_path.clone(),
            options: self.render_options(color)?,
        })
    }
}

/// Where and how to export, independent of the command line.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub path: Option<String>,
    pub engine_path: Option<String>,
    pub options: RenderOptions,
}

/// Walk and render the requested subtree.
pub async fn export_text(client: &dyn StoreClient, request: &ExportRequest) -> Result<String> {
    let (engine, sub) = resolve_target(request.path.as_deref(), request.engine_path.as_deref())?;
    let mut renderer = Renderer::new(request.options.clone())?;

    let located = walk_subtree_located(client, "", &engine, &sub, false)
        .await
        .with_context(|| format!("Failed to read {}/{}", engine, sub))?;

    if renderer.options().format == OutputFormat::Policy {
        let capabilities = collect_capabilities(client, &engine, &located.base, &located.tree)
            .await
            .context("Failed to query capabilities")?;
        renderer = renderer.with_capabilities(capabilities);
    }

    Ok(renderer.render(&engine, &located.base, &located.tree)?)
}

/// Capabilities of every leaf, or of the root when there are none, keyed
/// by full path.
async fn collect_capabilities(
    client: &dyn StoreClient,
    engine: &str,
    base: &str,
    tree: &Tree,
) -> Result<BTreeMap<String, Capability>> {
    let label = root_label(engine, base);
    let mut relative: Vec<String> = flatten(tree).into_keys().collect();
    if relative.is_empty() {
        relative.push(String::new());
    }

    let mut capabilities = BTreeMap::new();
    for rel in relative {
        let sub_path = format!("{}{}", base, rel);
        let capability = client.capabilities("", engine, &sub_path).await?;
        capabilities.insert(format!("{}{}", label, rel), capability);
    }
    Ok(capabilities)
}

/// Handle the export command
pub async fn handle_export_command(
    args: ExportArgs,
    client: &dyn StoreClient,
    color: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let request = args.request(color)?;
    let text = export_text(client, &request).await?;
    out.write_all(text.as_bytes()).context("Failed to write export")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, SecretLeaf};
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ExportArgs,
    }

    fn args(argv: &[&str]) -> ExportArgs {
        let mut full = vec!["export"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args
    }

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.put("", "kv", "app/db", SecretLeaf::from_pairs([("user", "admin")])).unwrap();
        store.put("", "kv", "top", SecretLeaf::from_pairs([("k", "value")])).unwrap();
        store
    }

    async fn run(store: &InMemoryStore, argv: &[&str]) -> Result<String> {
        let mut out = Vec::new();
        handle_export_command(args(argv), store, false, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_defaults() {
        let parsed = args(&["-p", "kv"]);
        assert_eq!(parsed.format, "base");
        assert_eq!(parsed.max_value_length, 12);
        let parsed = args(&["-p", "kv", "--max-value-length", "-1"]);
        assert_eq!(parsed.max_value_length, -1);
    }

    #[tokio::test]
    async fn test_export_subpath_as_json() {
        let out = run(&store(), &["-p", "kv/app", "-f", "json"]).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["kv/app/"]["db"]["user"], "admin");
    }

    #[tokio::test]
    async fn test_export_single_leaf_masks_values() {
        let out = run(&store(), &["-p", "kv/top"]).await.unwrap();
        assert_eq!(out, "kv/\n└── top\n    └── k=*****\n");
    }

    #[tokio::test]
    async fn test_export_rejects_option_combo() {
        let err = run(&store(), &["-p", "kv", "--only-keys", "--show-values"]).await.unwrap_err();
        let err = err.downcast::<crate::errors::VkvError>().unwrap();
        assert_eq!(err.kind(), "bad-option-combo");
    }

    #[tokio::test]
    async fn test_export_policy_queries_capabilities() {
        let store = store();
        store.set_capabilities("", "kv", "top", Capability::from_names(&["read", "list"])).unwrap();
        let out = run(&store, &["-p", "kv", "-f", "policy"]).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("PATH"));
        assert!(lines[1].starts_with("kv/app/db"));
        assert!(lines[2].starts_with("kv/top"));
        assert!(lines[1].matches('✔').count() > lines[2].matches('✔').count());
    }

    #[tokio::test]
    async fn test_missing_engine_is_reported() {
        let err = run(&store(), &["-p", "nope/x"]).await.unwrap_err();
        assert!(format!("{:#}", err).contains("nope/x"));
    }
}
