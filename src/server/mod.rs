//! # Export Server
//!
//! Serves one pre-rendered export at `GET /export`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::{Result, VkvError};
use crate::observability::trace_http_requests;

#[derive(Debug, Clone)]
struct ExportState {
    body: Arc<str>,
}

async fn export_handler(State(state): State<ExportState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], state.body.to_string())
}

/// Router answering `GET /export` with `body`.
pub fn build_router(body: impl Into<String>) -> Router {
    let state = ExportState { body: Arc::from(body.into()) };
    Router::new()
        .route("/export", get(export_handler))
        .layer(middleware::from_fn(trace_http_requests))
        .with_state(state)
}

/// Serve `router` on an already bound listener until `shutdown` fires.
pub async fn run_server(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| VkvError::transport(format!("export server error: {}", e)))
}

/// Bind `address` and serve `body` until `shutdown` fires.
pub async fn start_export_server(
    address: &str,
    body: String,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|e| VkvError::bad_input(format!("invalid server address '{}': {}", address, e)))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| VkvError::transport(format!("failed to bind export server: {}", e)))?;

    info!(address = %addr, bytes = body.len(), "Starting export server");
    run_server(listener, build_router(body), shutdown).await?;
    info!("Export server shutdown completed");
    Ok(())
}
