//! # firestore-mcp
//!
//! MCP (Model Context Protocol) server for Google Cloud Firestore.
//!
//! This crate provides an MCP server that exposes Firestore document operations as tools
//! for AI agents. It implements the MCP protocol over stdin/stdout using JSON-RPC 2.0.
//!
//! ## Features
//!
//! - **7 tools**: list collections, query (ordered or filtered), get, create, update, delete
//! - **Zero configuration**: the project id is picked up from the environment, gcloud, or
//!   the nearest `firebase.json` / `.firebaserc`
//! - **Emulator support**: honours `FIRESTORE_EMULATOR_HOST`
//!
//! ## Usage
//!
//! The server is typically run as an executable and configured in AI tools like Claude Desktop:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "firestore": {
//!       "command": "/path/to/firestore-mcp",
//!       "env": { "GOOGLE_CLOUD_PROJECT": "my-project" }
//!     }
//!   }
//! }
//! ```
//!
//! ## Library Usage
//!
//! For testing or embedding, you can use the library API with the in-memory store:
//!
//! ```no_run
//! use std::sync::Arc;
//! use firestore_mcp::{McpServer, McpSession, MemoryStore, ProjectSource, ResolvedProjectId};
//!
//! let project = ResolvedProjectId::new("demo-project", ProjectSource::Env("GOOGLE_CLOUD_PROJECT"));
//! let session = McpSession::new(project, Arc::new(MemoryStore::new()));
//! let server = McpServer::new(session);
//!
//! // Run the server (reads from stdin, writes to stdout)
//! // server.run().await.expect("Server error");
//! ```

#![warn(missing_docs)]

mod convert;
mod error;
mod project;
mod server;
mod session;
mod settings;
mod startup;
pub mod store;
mod tools;

pub use convert::DEFAULT_LIMIT;
pub use error::{McpError, Result, StartupError};
pub use project::{
    find_in_ancestors, read_default_project, CliQuery, ProjectResolver, ProjectSource,
    ResolvedProjectId, CONFIG_FILE_NAMES, MAX_SEARCH_DEPTH, PROJECT_ENV_VARS,
};
pub use server::{tool_error, tool_success, JsonRpcRequest, JsonRpcResponse, McpServer};
pub use session::McpSession;
pub use settings::{Settings, DEFAULT_DATABASE_ID, EMULATOR_HOST_ENV};
pub use startup::{bootstrap, bootstrap_with_store, resolve_project};
pub use store::{DocumentStore, FirestoreStore, FirestoreStoreOptions, MemoryStore};
pub use tools::{ToolDef, ToolRegistry};
