//! Server bring-up.
//!
//! Resolves the project, builds the store and checks it is reachable. Nothing
//! is served until all three succeed.

use std::sync::Arc;

use tracing::info;

use crate::error::StartupError;
use crate::project::{ProjectResolver, ProjectSource, ResolvedProjectId};
use crate::server::McpServer;
use crate::session::McpSession;
use crate::settings::Settings;
use crate::store::{DocumentStore, FirestoreStore, FirestoreStoreOptions, MemoryStore};

/// Resolve the project id, or fail listing every source consulted.
pub async fn resolve_project(resolver: &ProjectResolver) -> Result<ResolvedProjectId, StartupError> {
    let project_id = resolver
        .resolve()
        .await
        .ok_or_else(|| StartupError::ProjectIdNotFound {
            checked: ProjectSource::ALL.to_vec(),
        })?;

    match project_id.config_path() {
        Some(path) => info!(project_id = %project_id, source = %project_id.source(), path = %path.display(), "using project"),
        None => info!(project_id = %project_id, source = %project_id.source(), "using project"),
    }
    Ok(project_id)
}

/// Bring up a server according to `settings`.
pub async fn bootstrap(settings: &Settings, resolver: &ProjectResolver) -> Result<McpServer, StartupError> {
    let project_id = resolve_project(resolver).await?;

    let store: Arc<dyn DocumentStore> = if settings.in_memory {
        info!("using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let options = FirestoreStoreOptions::new(project_id.as_str())
            .database(settings.database_id.clone())
            .emulator_host(settings.emulator_host.clone());
        Arc::new(FirestoreStore::connect(options).await.map_err(StartupError::Client)?)
    };

    start(project_id, store).await
}

/// Bring up a server over an already constructed store.
pub async fn bootstrap_with_store(
    resolver: &ProjectResolver,
    store: Arc<dyn DocumentStore>,
) -> Result<McpServer, StartupError> {
    let project_id = resolve_project(resolver).await?;
    start(project_id, store).await
}

async fn start(project_id: ResolvedProjectId, store: Arc<dyn DocumentStore>) -> Result<McpServer, StartupError> {
    store.ping().await.map_err(|source| StartupError::Connectivity {
        project_id: project_id.to_string(),
        source,
    })?;
    info!(project_id = %project_id, "connectivity check passed");

    Ok(McpServer::new(McpSession::new(project_id, store)))
}
