//! # LitScope Binary
//!
//! The entry point that assembles the application based on compile-time
//! features: each external collaborator (document store, session provider,
//! object store, book catalog) is a plugin crate selected here and injected
//! through its ls-core port.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ls_api::{router, AppState};
use ls_configs::AppConfig;
use ls_core::traits::{ClubStore, ProfileStore, ThreadStore};
use ls_sync::{CheckInTracker, ClubDirectory, SessionSync};

#[cfg(feature = "store-memory")]
use ls_store_memory::MemoryDocumentStore;

#[cfg(feature = "auth-local")]
use ls_auth_local::LocalSessionProvider;

#[cfg(feature = "storage-local")]
use ls_storage_local::LocalImageStore;

#[cfg(feature = "catalog-google")]
use ls_catalog_google::GoogleBooksCatalog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    // 1. Document store implementation
    #[cfg(feature = "store-memory")]
    let store = Arc::new(MemoryDocumentStore::new());

    // 2. Identity provider implementation
    #[cfg(feature = "auth-local")]
    let provider = Arc::new(LocalSessionProvider::new());

    // 3. Object store implementation
    #[cfg(feature = "storage-local")]
    let images = Arc::new(LocalImageStore::new(
        config.media.root_dir.clone().into(),
        config.media.url_prefix.clone(),
    ));

    // 4. Book catalog implementation
    #[cfg(feature = "catalog-google")]
    let catalog = Arc::new(GoogleBooksCatalog::new(
        config.catalog.base_url.clone(),
        config.catalog.api_key.clone(),
    ));

    // 5. Wire the synchronizer layer over the ports
    let clubs: Arc<dyn ClubStore> = store.clone();
    let threads: Arc<dyn ThreadStore> = store.clone();
    let profiles: Arc<dyn ProfileStore> = store;
    let state = AppState {
        clubs: clubs.clone(),
        threads: threads.clone(),
        session: Arc::new(SessionSync::new(provider, profiles.clone())),
        directory: Arc::new(ClubDirectory::new(clubs, threads, images)),
        check_ins: Arc::new(CheckInTracker::new(profiles)),
        catalog,
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "litscope listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
