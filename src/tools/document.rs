//! Single-document tools.
//!
//! Tools: get_document, create_document, update_document, delete_document

use serde_json::{Map, Value as JsonValue};
use tracing::info;

use crate::convert::{
    get_collection_arg, get_doc_id_arg, get_object_arg, get_optional_bool, get_optional_doc_id,
};
use crate::error::{McpError, Result};
use crate::schema;
use crate::session::McpSession;
use crate::store::WriteMode;
use crate::tools::ToolDef;

/// Names of the tools handled here.
pub const TOOL_NAMES: &[&str] = &["get_document", "create_document", "update_document", "delete_document"];

/// Get all document tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "get_document",
            "Get a document by id. Returns {id, exists, data}; data is null when the document \
             doesn't exist.",
            schema!(object {
                required: { "collection": string, "docId": string }
            }),
        ),
        ToolDef::new(
            "create_document",
            "Create a document. Without docId an id is generated; with docId the document is \
             written at that id, replacing any existing content.",
            schema!(object {
                required: { "collection": string, "data": object },
                optional: { "docId": string }
            }),
        ),
        ToolDef::new(
            "update_document",
            "Update a document. With merge=true (default) the fields are merged into the document, \
             creating it if needed. With merge=false the named fields are replaced and the \
             document must already exist.",
            schema!(object {
                required: { "collection": string, "docId": string, "data": object },
                optional: { "merge": boolean }
            }),
        ),
        ToolDef::new(
            "delete_document",
            "Delete a document. Deleting a document that doesn't exist succeeds.",
            schema!(object {
                required: { "collection": string, "docId": string }
            }),
        ),
    ]
}

/// Dispatch a document tool call.
pub async fn dispatch(
    session: &McpSession,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        "get_document" => {
            let collection = get_collection_arg(&args)?;
            let id = get_doc_id_arg(&args)?;

            let result = match session.store().get_document(&collection, &id).await? {
                Some(doc) => serde_json::json!({
                    "id": doc.id,
                    "exists": true,
                    "data": doc.data,
                }),
                None => serde_json::json!({
                    "id": id,
                    "exists": false,
                    "data": null,
                }),
            };
            Ok(result)
        }

        "create_document" => {
            let collection = get_collection_arg(&args)?;
            let data = get_object_arg(&args, "data")?;
            let requested = get_optional_doc_id(&args)?;

            let id = session
                .store()
                .create_document(&collection, requested.as_deref(), data)
                .await?;
            info!(collection = %collection, id = %id, "document created");

            Ok(serde_json::json!({
                "collection": collection,
                "id": id,
                "operation": "created",
            }))
        }

        "update_document" => {
            let collection = get_collection_arg(&args)?;
            let id = get_doc_id_arg(&args)?;
            let data = get_object_arg(&args, "data")?;
            let merge = get_optional_bool(&args, "merge").unwrap_or(true);

            if data.is_empty() {
                return Err(McpError::InvalidArg {
                    name: "data".to_string(),
                    reason: "At least one field must be updated".to_string(),
                });
            }

            let mode = if merge { WriteMode::Merge } else { WriteMode::Update };
            session.store().write_document(&collection, &id, data, mode).await?;
            info!(collection = %collection, id = %id, merge, "document updated");

            Ok(serde_json::json!({
                "collection": collection,
                "id": id,
                "operation": "updated",
                "merge": merge,
            }))
        }

        "delete_document" => {
            let collection = get_collection_arg(&args)?;
            let id = get_doc_id_arg(&args)?;

            session.store().delete_document(&collection, &id).await?;
            info!(collection = %collection, id = %id, "document deleted");

            Ok(serde_json::json!({
                "collection": collection,
                "id": id,
                "operation": "deleted",
            }))
        }

        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}
