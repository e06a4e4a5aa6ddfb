//! `lodestone-api` binary entrypoint.
//!
//! Loads configuration from environment variables and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use lodestone_api::config::Config;
use lodestone_api::server::Server;
use lodestone_core::observability::{init_logging, LogFormat};
use lodestone_core::storage::{MemoryBackend, StorageBackend};
use lodestone_core::{MemoryRegistry, S3Backend};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_logging(choose_log_format(&config));

    let storage: Arc<dyn StorageBackend> = if let Some(bucket) = config.storage.bucket.as_deref() {
        tracing::info!(bucket = %bucket, "Using S3-compatible storage backend");
        Arc::new(S3Backend::from_bucket(bucket)?)
    } else {
        if !config.debug {
            anyhow::bail!("LODESTONE_STORAGE_BUCKET is required when LODESTONE_DEBUG=false");
        }
        tracing::warn!(
            "LODESTONE_STORAGE_BUCKET not set; using in-memory storage backend (debug only)"
        );
        Arc::new(MemoryBackend::new())
    };

    let server = Server::builder()
        .config(config)
        .storage_backend(storage)
        .registry(Arc::new(MemoryRegistry::new()))
        .build();

    server.serve().await?;
    Ok(())
}
