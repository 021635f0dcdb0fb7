//! ordo-sw worker entry point.
//!
//! Boots the worker context, installs the configured cache version, and
//! serves the worker's events as MCP tools on stdio. Logging goes to stderr to
//! avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use ordo_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod context;
mod control;
mod events;
mod handler;
mod lifecycle;
mod push;
mod request;
mod router;
mod strategy;
mod sync;
#[cfg(test)]
mod testing;
mod tools;

use context::WorkerContext;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin_url,
        version = %config.cache_version,
        db = %config.db_path.display(),
        "Starting ordo-sw worker on stdio transport"
    );

    let ctx = WorkerContext::init(config).await?;

    match ctx.register().await {
        Ok(report) => tracing::info!(version = %report.version, state = %report.state, entries = report.entries, "registered"),
        Err(e) => tracing::error!(error = %e, "start-up install failed; serving with the existing cache"),
    }

    let handler = handler::OrdoWorkerServer::new(Arc::clone(&ctx));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    ctx.shutdown().await;

    Ok(())
}
