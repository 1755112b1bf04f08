//! # Command Line Interface
//!
//! Export, import, snapshot, list and search commands against a namespaced
//! KV v2 secret store.

pub mod config;
pub mod export;
pub mod find;
pub mod import;
pub mod list;
pub mod server;
pub mod snapshot;

use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::command_span;
use crate::config::RenewalConfig;
use crate::observability::init_logging;
use crate::store::{start_refresher, HttpStoreClient, StoreClient};

#[derive(Parser, Debug)]
#[command(name = "vkv")]
#[command(about = "Export, import and snapshot secrets of a namespaced KV v2 store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "VKV_LOG_JSON")]
    pub log_json: bool,

    /// Configuration file path (defaults to ~/.vkv/config.toml)
    #[arg(long, global = true, env = config::ENV_CONFIG, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render secrets of an engine or sub-path
    Export(export::ExportArgs),

    /// Write a YAML or JSON tree into an engine
    Import(import::ImportArgs),

    /// Save or restore the whole store
    Snapshot {
        #[command(subcommand)]
        command: snapshot::SnapshotCommands,
    },

    /// List namespaces or engines
    List {
        #[command(subcommand)]
        command: list::ListCommands,
    },

    /// Search secrets, engines or namespaces
    Find {
        #[command(subcommand)]
        command: find::FindCommands,
    },

    /// Serve an export over HTTP
    Server(server::ServerArgs),

    /// Print the version
    Version,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Export(_) => "export",
            Self::Import(_) => "import",
            Self::Snapshot { .. } => "snapshot",
            Self::List { .. } => "list",
            Self::Find { .. } => "find",
            Self::Server(_) => "server",
            Self::Version => "version",
        }
    }
}

/// Parse arguments, exiting 0 for help and version output and 1 for
/// usage errors.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    }
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = parse_args();
    init_logging(cli.verbose, cli.log_json);

    if let Commands::Version = cli.command {
        println!("{} {}", crate::APP_NAME, crate::VERSION);
        return Ok(());
    }

    let store = config::resolve_store_config(cli.config.as_deref())?;
    let client = HttpStoreClient::new(&store).context("Failed to create store client")?;

    let cancel = CancellationToken::new();
    let renewal = RenewalConfig::from_env().context("Invalid token renewal settings")?;
    let refresher = start_refresher(&store, renewal, cancel.clone())?;

    let span = command_span!(cli.command.name());
    let result = dispatch(cli.command, &client, cancel.clone()).instrument(span).await;

    cancel.cancel();
    if let Some(handle) = refresher {
        let _ = handle.await;
    }
    result
}

async fn dispatch(
    command: Commands,
    client: &dyn StoreClient,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let color = config::resolve_color(std::io::stdout().is_terminal());
    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr();

    match command {
        Commands::Export(args) => {
            export::handle_export_command(args, client, color, &mut stdout).await?
        }
        Commands::Import(args) => {
            let mut stdin = std::io::stdin().lock();
            import::handle_import_command(args, client, &mut stdin, &mut stdout, &mut stderr)
                .await?
        }
        Commands::Snapshot { command } => {
            snapshot::handle_snapshot_command(command, client, &mut stderr).await?
        }
        Commands::List { command } => {
            list::handle_list_command(command, client, &mut stdout).await?
        }
        Commands::Find { command } => {
            let display =
                find::FindDisplay { color, hyperlinks: config::resolve_hyperlinks() };
            find::handle_find_command(command, client, display, &mut stdout).await?
        }
        Commands::Server(args) => server::handle_server_command(args, client, cancel).await?,
        Commands::Version => println!("{} {}", crate::APP_NAME, crate::VERSION),
    }

    stdout.flush().context("Failed to flush output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_nested_commands() {
        let cli = Cli::try_parse_from(["vkv", "snapshot", "save", "-d", "/tmp/snap"]).unwrap();
        assert_eq!(cli.command.name(), "snapshot");

        let cli = Cli::try_parse_from(["vkv", "-v", "list", "engines", "-a"]).unwrap();
        assert!(cli.verbose);

        let cli = Cli::try_parse_from(["vkv", "find", "secrets", "-p", "db", "--print-url"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_usage_errors() {
        let err = Cli::try_parse_from(["vkv", "export", "-f", "xml"]).unwrap_err();
        assert!(err.use_stderr());

        let err = Cli::try_parse_from(["vkv", "--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }
}
