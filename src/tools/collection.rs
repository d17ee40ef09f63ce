//! Collection-level tools.
//!
//! Tools: list_collections, query_collection, query_with_where

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::convert::{
    documents_to_json, get_collection_arg, get_limit_arg, get_optional_string, get_string_arg,
    get_value_arg,
};
use crate::error::{McpError, Result};
use crate::schema;
use crate::session::McpSession;
use crate::store::{CollectionQuery, FieldFilter, FilterOperator, OrderDirection};
use crate::tools::ToolDef;

/// Names of the tools handled here.
pub const TOOL_NAMES: &[&str] = &["list_collections", "query_collection", "query_with_where"];

/// Get all collection tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "query_collection",
            "Query documents in a Firestore collection. Returns up to `limit` documents \
             (default 10) as {id, data}, optionally ordered by a field.",
            schema!(object {
                required: { "collection": string },
                optional: { "limit": integer, "orderBy": string, "orderDirection": direction }
            }),
        ),
        ToolDef::new(
            "query_with_where",
            "Query a Firestore collection with a single field filter, e.g. field='age', \
             operator='>=', value=21. Returns up to `limit` matching documents (default 10).",
            schema!(object {
                required: { "collection": string, "field": string, "operator": operator, "value": any },
                optional: { "limit": integer }
            }),
        ),
        ToolDef::new(
            "list_collections",
            "List the root collections of the Firestore database.",
            schema!(object {}),
        ),
    ]
}

/// Dispatch a collection tool call.
pub async fn dispatch(
    session: &McpSession,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        "query_collection" => {
            let collection = get_collection_arg(&args)?;
            let limit = get_limit_arg(&args)?;

            let mut query = CollectionQuery::new(&collection, limit);
            if let Some(field) = get_optional_string(&args, "orderBy") {
                let direction = match get_optional_string(&args, "orderDirection") {
                    Some(d) => d.parse::<OrderDirection>()?,
                    None => OrderDirection::default(),
                };
                query = query.order_by(field, direction);
            }

            let docs = session.store().query(&query).await?;
            debug!(collection = %collection, count = docs.len(), "query_collection");

            Ok(serde_json::json!({
                "collection": collection,
                "count": docs.len(),
                "documents": documents_to_json(&docs),
            }))
        }

        "query_with_where" => {
            let collection = get_collection_arg(&args)?;
            let field = get_string_arg(&args, "field")?;
            let op = get_string_arg(&args, "operator")?.parse::<FilterOperator>()?;
            let value = get_value_arg(&args, "value")?;
            let limit = get_limit_arg(&args)?;

            if op.takes_list() && !value.is_array() {
                return Err(McpError::InvalidArg {
                    name: "value".to_string(),
                    reason: format!("Operator '{}' requires an array value", op),
                });
            }

            let operand = match &value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            let description = format!("{} {} {}", field, op, operand);
            let query = CollectionQuery::new(&collection, limit).filter(FieldFilter { field, op, value });

            let docs = session.store().query(&query).await?;
            debug!(collection = %collection, query = %description, count = docs.len(), "query_with_where");

            Ok(serde_json::json!({
                "collection": collection,
                "query": description,
                "count": docs.len(),
                "documents": documents_to_json(&docs),
            }))
        }

        "list_collections" => {
            let collections = session.store().list_collections().await?;
            Ok(serde_json::json!({ "collections": collections }))
        }

        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}
