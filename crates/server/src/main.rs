//! posterframe server entry point.
//!
//! Boots the image cache from layered configuration and serves it as an MCP
//! server on stdio. Logging goes to stderr to avoid interfering with the
//! JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use posterframe_client::{FetchClient, FetchConfig, ImageCache, LoaderInterceptor};
use posterframe_core::{AppConfig, BlobStore, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
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
    tracing::info!(
        db_path = %config.db_path.display(),
        blob_dir = %config.blob_dir.display(),
        budget_bytes = config.budget_bytes,
        evict_target_ratio = config.evict_target_ratio,
        "Starting posterframe server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let blobs = BlobStore::open(config.blob_dir.clone()).await?;
    let fetch = Arc::new(FetchClient::new(FetchConfig::from(&config))?);

    let cache = Arc::new(ImageCache::new(db, blobs, fetch.clone(), config.cache_settings()));
    let loader = Arc::new(LoaderInterceptor::new(cache.clone(), fetch));

    let handler = handler::PosterframeServer::new(cache, loader);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
