//! Server CLI command
//!
//! Renders one export at start-up and serves it until interrupted.

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::export::{export_text, ExportRequest};
use crate::render::{OutputFormat, RenderOptions};
use crate::server::start_export_server;
use crate::store::StoreClient;

#[derive(Args, Debug, Clone)]
#[command(
    after_help = "EXAMPLES:\n    # Serve an engine as JSON\n    vkv server -p secret\n    curl http://127.0.0.1:8080/export\n\n    # Serve shell exports on another port\n    vkv server -p secret/app -f export --address 0.0.0.0:9000"
)]
pub struct ServerArgs {
    /// Engine and sub-path to serve
    #[arg(short, long, env = "VKV_SERVER_PATH", value_name = "PATH")]
    pub path: Option<String>,

    /// Engine path, for engines whose mount contains '/'
    #[arg(short, long, env = "VKV_SERVER_ENGINE_PATH", value_name = "ENGINE")]
    pub engine_path: Option<String>,

    /// Address to listen on
    #[arg(long, env = "VKV_SERVER_ADDRESS", default_value = "127.0.0.1:8080")]
    pub address: String,

    /// Output format of the served export
    #[arg(
        short,
        long,
        env = "VKV_SERVER_FORMAT",
        default_value = "json",
        value_parser = OutputFormat::NAMES
    )]
    pub format: String,
}

impl ServerArgs {
    fn request(&self) -> Result<ExportRequest> {
        Ok(ExportRequest {
            path: self.path.clone(),
            engine_path: self.engine_path.clone(),
            options: RenderOptions {
                show_values: true,
                ..RenderOptions::with_format(self.format.parse()?)
            },
        })
    }
}

/// Handle the server command
pub async fn handle_server_command(
    args: ServerArgs,
    client: &dyn StoreClient,
    shutdown: CancellationToken,
) -> Result<()> {
    let body = export_text(client, &args.request()?).await?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal.cancel();
        }
    });

    start_export_server(&args.address, body, shutdown)
        .await
        .with_context(|| format!("Failed to serve export on {}", args.address))
}
