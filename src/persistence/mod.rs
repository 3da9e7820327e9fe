//! Opt-in persistence negotiation and per-server store setup
//!
//! Mirrors the host's persisted-storage handshake:
//! - A silent status check that never prompts
//! - A single prompt when access has not been decided yet
//! - Directory resolution for the server's sandboxed subfolder

pub mod store;
pub mod types;

use std::sync::Arc;

use log::{debug, info};

use crate::host::{StorageHost, StreamFetcher};
use store::PersistenceStore;
use types::{PersistenceResult, PersistenceState, Server};

/// Fixed top-level application folder under the storage root.
pub const APP_DIRECTORY: &str = "sonata";

/// Resolve the server's directory (creating it if absent) and wrap it in
/// a store.
async fn create(
    storage: Arc<dyn StorageHost>,
    fetcher: Arc<dyn StreamFetcher>,
    server: &Server,
) -> Result<PersistenceResult, String> {
    let handle = storage
        .open_directory(&[APP_DIRECTORY, &server.id])
        .await
        .map_err(|e| format!("Failed to resolve server directory: {}", e))?;
    info!("persistence: store ready for server {}", server.id);
    Ok(PersistenceResult::Success {
        store: PersistenceStore::new(storage, fetcher, server.clone(), handle),
    })
}

/// Silently inspect the host's persisted-storage status. Never prompts.
pub async fn check_persistence(storage: &dyn StorageHost) -> PersistenceState {
    if !storage.supports_persistence() {
        return PersistenceState::Unsupported;
    }
    if storage.persisted().await {
        return PersistenceState::AccessGranted;
    }
    PersistenceState::NoAccess
}

/// Run the full negotiation: straight to directory setup when already
/// granted, otherwise one permission request, with the outcome reported
/// as a closed [`PersistenceResult`]. The `Err` arm carries only host
/// directory-resolution failures.
pub async fn init_persistence(
    storage: Arc<dyn StorageHost>,
    fetcher: Arc<dyn StreamFetcher>,
    server: &Server,
) -> Result<PersistenceResult, String> {
    if !storage.supports_persistence() {
        return Ok(PersistenceResult::Unsupported);
    }

    // Already granted: no prompt, straight to directory setup.
    if storage.persisted().await {
        return create(storage, fetcher, server).await;
    }

    debug!(
        "persistence: requesting persistent storage for server {}",
        server.id
    );
    if !storage.persist().await {
        return Ok(PersistenceResult::PermissionDenied);
    }
    create(storage, fetcher, server).await
}
