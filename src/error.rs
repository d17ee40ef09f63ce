//! Error types for the MCP server.
//!
//! Per-request failures are `McpError` and end up in an `isError` tool result.
//! Failures before the server is ready are `StartupError` and are fatal.

use serde::{Deserialize, Serialize};

use crate::project::ProjectSource;

/// MCP server errors.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum McpError {
    /// Error reported by Firestore.
    #[error("firestore error: {message}")]
    Firestore {
        /// Canonical status from the Firestore response (e.g. `NOT_FOUND`)
        code: String,
        /// Human-readable error message
        message: String,
    },

    /// Transport-level failure talking to Firestore.
    #[error("http error: {0}")]
    Http(String),

    /// Unknown tool requested.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArg(String),

    /// Invalid argument value.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArg {
        /// Argument name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// JSON-RPC protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        McpError::Http(err.to_string())
    }
}

impl From<gcp_auth::Error> for McpError {
    fn from(err: gcp_auth::Error) -> Self {
        McpError::Firestore {
            code: "UNAUTHENTICATED".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Protocol(format!("JSON error: {}", err))
    }
}

/// JSON-RPC error codes.
pub mod rpc_codes {
    /// Parse error - Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
}

impl McpError {
    /// Short machine-readable kind, reported alongside the message in tool errors.
    pub fn kind(&self) -> &str {
        match self {
            McpError::Firestore { code, .. } => code,
            McpError::Http(_) => "HTTP_ERROR",
            McpError::UnknownTool(_) => "UNKNOWN_TOOL",
            McpError::MissingArg(_) => "MISSING_ARGUMENT",
            McpError::InvalidArg { .. } => "INVALID_ARGUMENT",
            McpError::NotFound(_) => "NOT_FOUND",
            McpError::Protocol(_) => "PROTOCOL_ERROR",
            McpError::Io(_) => "IO_ERROR",
            McpError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Fatal errors raised while bringing the server up.
///
/// The binary maps every variant to exit status 1; embedders can match on them instead.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// No configuration source produced a project id.
    #[error("{}", project_not_found_message(checked))]
    ProjectIdNotFound {
        /// Every source that was consulted, in priority order
        checked: Vec<ProjectSource>,
    },

    /// The connectivity probe against the database failed.
    #[error("failed to connect to Firestore project '{project_id}': {source}")]
    Connectivity {
        /// Project the probe was issued against
        project_id: String,
        /// Underlying failure
        #[source]
        source: McpError,
    },

    /// The store could not be constructed.
    #[error("failed to initialise Firestore client: {0}")]
    Client(#[source] McpError),
}

fn project_not_found_message(checked: &[ProjectSource]) -> String {
    let mut msg = String::from("could not determine a Google Cloud project id. Checked:");
    for source in checked {
        msg.push_str("\n  - ");
        msg.push_str(&source.to_string());
    }
    msg.push_str("\nSet GOOGLE_CLOUD_PROJECT or run inside a Firebase project directory.");
    msg
}
