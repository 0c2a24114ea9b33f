//! stash-mcp server entry point.
//!
//! Boots the offline cache layer and exposes its hooks as MCP tools on the
//! stdio transport. Logging goes to stderr to avoid interfering with the
//! JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use stash_client::{OfflineCache, open_storage};
use stash_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let storage = open_storage(&config).await?;
    let cache = Arc::new(OfflineCache::from_config(&config, storage)?);

    tracing::info!(version = %config.cache_version(), "Starting stash-mcp server on stdio transport");

    let handler = handler::StashServer::new(Arc::clone(&cache), config.manifest_path.clone());
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    cache.shutdown().await;

    Ok(())
}
