//! MCP session state.
//!
//! Holds the database handle shared by every tool call.

use std::sync::Arc;

use crate::project::ResolvedProjectId;
use crate::store::DocumentStore;

/// MCP session state.
///
/// Created once at startup and shared by all in-flight requests; the store is
/// the only state and it is safe for concurrent use.
#[derive(Clone)]
pub struct McpSession {
    /// Project the store is bound to
    project_id: ResolvedProjectId,
    /// Database client
    store: Arc<dyn DocumentStore>,
}

impl McpSession {
    /// Create a new MCP session over a document store.
    pub fn new(project_id: ResolvedProjectId, store: Arc<dyn DocumentStore>) -> Self {
        Self { project_id, store }
    }

    /// The project this session talks to.
    pub fn project_id(&self) -> &ResolvedProjectId {
        &self.project_id
    }

    /// The underlying document store.
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}
