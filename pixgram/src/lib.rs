pub mod config;
pub mod media;
mod routes;
pub mod services;

use std::sync::Arc;

use anyhow::Result;
use pix_axum::{axum, AxumApp};
use pix_blob::FsBlobStore;
use pix_core::PixConfig;

use crate::services::adapters::MemoryStore;

/// Build the app from `.env`, the environment and defaults.
pub fn build() -> Result<AxumApp> {
    build_with(config::load())
}

/// Build the app from an explicit configuration; unset keys take defaults.
pub fn build_with(mut config: PixConfig) -> Result<AxumApp> {
    config::apply_defaults(&mut config);
    let snapshot = config.snapshot();

    let storage_root = snapshot
        .get_string("storage.root")
        .ok_or_else(|| anyhow::anyhow!("storage.root is not configured"))?;
    std::fs::create_dir_all(&storage_root)?;

    let store = Arc::new(MemoryStore::new());
    let state = services::configure(&snapshot, store.clone(), store, FsBlobStore::new(&storage_root));

    tracing::info!(storage_root = %storage_root, "pixgram configured");

    let ax = axum(config)
        .merge(routes::router(state))
        .service("/health", || async { "ok" })
        .serve_dir("/uploads", &storage_root)
        .with_request_tracing();

    Ok(ax)
}
