//! Import CLI command

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::import::{import, ImportOptions};
use crate::render::DEFAULT_MAX_VALUE_LENGTH;
use crate::store::StoreClient;
use crate::utils::resolve_target;

#[derive(Args, Debug, Clone)]
#[command(
    after_help = "EXAMPLES:\n    # Copy one engine into another\n    vkv export -p secret -f yaml --show-values | vkv import -p copy -f -\n\n    # Preview the merge first\n    vkv import -p secret/app -f app.yaml --dry-run\n\n    # Write into an engine that already has secrets\n    vkv import -p secret -f backup.json --force"
)]
pub struct ImportArgs {
    /// Destination engine and sub-path
    #[arg(short, long, env = "VKV_IMPORT_PATH", value_name = "PATH")]
    pub path: Option<String>,

    /// Destination engine path, for engines whose mount contains '/'
    #[arg(short, long, env = "VKV_IMPORT_ENGINE_PATH", value_name = "ENGINE")]
    pub engine_path: Option<String>,

    /// YAML or JSON file to import, '-' reads stdin
    #[arg(short, long, env = "VKV_IMPORT_FILE", default_value = "-", value_name = "FILE")]
    pub file: String,

    /// Write into an engine that already has secrets
    #[arg(long, env = "VKV_IMPORT_FORCE")]
    pub force: bool,

    /// Show the merged result without writing anything
    #[arg(long, env = "VKV_IMPORT_DRY_RUN")]
    pub dry_run: bool,

    /// Print nothing on success
    #[arg(long, env = "VKV_IMPORT_SILENT")]
    pub silent: bool,

    /// Show values in the printed tree
    #[arg(long, env = "VKV_IMPORT_SHOW_VALUES")]
    pub show_values: bool,

    /// Cap for masked and shown values, -1 disables it
    #[arg(
        long,
        env = "VKV_IMPORT_MAX_VALUE_LENGTH",
        default_value_t = DEFAULT_MAX_VALUE_LENGTH,
        allow_negative_numbers = true,
        value_name = "N"
    )]
    pub max_value_length: i64,
}

impl ImportArgs {
    fn options(&self) -> ImportOptions {
        ImportOptions {
            force: self.force,
            dry_run: self.dry_run,
            silent: self.silent,
            show_values: self.show_values,
            max_value_length: self.max_value_length,
        }
    }
}

/// Read the payload from `file`, or from `stdin` when it is `-`.
fn read_payload(file: &str, stdin: &mut dyn Read) -> Result<Vec<u8>> {
    if file == "-" {
        let mut buf = Vec::new();
        stdin.read_to_end(&mut buf).context("Failed to read payload from stdin")?;
        return Ok(buf);
    }
    let path = PathBuf::from(file);
    std::fs::read(&path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Handle the import command
pub async fn handle_import_command(
    args: ImportArgs,
    client: &dyn StoreClient,
    stdin: &mut dyn Read,
    out: &mut dyn Write,
    progress: &mut dyn Write,
) -> Result<()> {
    let options = args.options();
    options.validate()?;
    let (engine, sub) = resolve_target(args.path.as_deref(), args.engine_path.as_deref())?;
    let payload = read_payload(&args.file, stdin)?;

    let report = import(client, "", &engine, &sub, &payload, &options, out, progress).await?;
    tracing::debug!(engine = %engine, written = report.written.len(), "Import finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ImportArgs,
    }

    fn args(argv: &[&str]) -> ImportArgs {
        let mut full = vec!["import"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args
    }

    #[tokio::test]
    async fn test_import_from_stdin() {
        let store = InMemoryStore::new();
        let mut stdin: &[u8] = b"kv/:\n  app:\n    user: admin\n";
        let mut out = Vec::new();
        let mut progress = Vec::new();

        handle_import_command(args(&["-p", "kv"]), &store, &mut stdin, &mut out, &mut progress)
            .await
            .unwrap();

        assert!(store.leaves("", "kv").unwrap().contains_key("app"));
        assert_eq!(String::from_utf8(progress).unwrap(), "wrote kv/app (version 1)\n");
    }

    #[tokio::test]
    async fn test_import_from_file_with_engine_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("payload.json");
        std::fs::write(&file, r#"{"sub": "password"}"#).unwrap();
        let store = InMemoryStore::new();
        let file_arg = file.display().to_string();
        let argv = ["-e", "engine/path", "-p", "admin", "-f", &file_arg, "--silent"];

        handle_import_command(
            args(&argv),
            &store,
            &mut std::io::empty(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await
        .unwrap();

        let leaves = store.leaves("", "engine/path").unwrap();
        assert_eq!(leaves["admin"].data["sub"].to_string(), "password");
    }

    #[tokio::test]
    async fn test_force_with_dry_run_is_rejected() {
        let store = InMemoryStore::new();
        let err = handle_import_command(
            args(&["-p", "kv", "--force", "--dry-run"]),
            &store,
            &mut std::io::empty(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await
        .unwrap_err();
        let err = err.downcast::<crate::errors::VkvError>().unwrap();
        assert_eq!(err.kind(), "bad-option-combo");
    }
}
