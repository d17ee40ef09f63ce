//! Argument extraction and result shaping for tool calls.

use serde_json::{Map, Value as JsonValue};

use crate::error::{McpError, Result};
use crate::store::{Document, Fields};

/// Number of documents returned by queries when no limit is given.
pub const DEFAULT_LIMIT: u32 = 10;

/// Convert a list of documents to `[{id, data}, ...]`.
pub fn documents_to_json(docs: &[Document]) -> JsonValue {
    JsonValue::Array(docs.iter().map(Document::to_json).collect())
}

/// Helper to get a required string argument from JSON arguments.
pub fn get_string_arg(args: &Map<String, JsonValue>, name: &str) -> Result<String> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| McpError::MissingArg(name.to_string()))
}

/// Helper to get an optional string argument from JSON arguments.
pub fn get_optional_string(args: &Map<String, JsonValue>, name: &str) -> Option<String> {
    args.get(name).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Helper to get an optional boolean argument.
pub fn get_optional_bool(args: &Map<String, JsonValue>, name: &str) -> Option<bool> {
    args.get(name).and_then(|v| v.as_bool())
}

/// Helper to get a required argument of any JSON type.
pub fn get_value_arg(args: &Map<String, JsonValue>, name: &str) -> Result<JsonValue> {
    args.get(name)
        .cloned()
        .ok_or_else(|| McpError::MissingArg(name.to_string()))
}

/// Helper to get a required JSON object argument (document data).
pub fn get_object_arg(args: &Map<String, JsonValue>, name: &str) -> Result<Fields> {
    match args.get(name) {
        Some(JsonValue::Object(obj)) => Ok(obj.clone()),
        Some(_) => Err(McpError::InvalidArg {
            name: name.to_string(),
            reason: "Expected a JSON object".to_string(),
        }),
        None => Err(McpError::MissingArg(name.to_string())),
    }
}

/// Helper to get the query limit, defaulting to `DEFAULT_LIMIT`.
///
/// Accepts positive integers, including integral floats such as `5.0`.
pub fn get_limit_arg(args: &Map<String, JsonValue>) -> Result<u32> {
    let invalid = || McpError::InvalidArg {
        name: "limit".to_string(),
        reason: "Expected a positive integer".to_string(),
    };

    match args.get("limit") {
        None | Some(JsonValue::Null) => Ok(DEFAULT_LIMIT),
        Some(JsonValue::Number(n)) => {
            let limit = match n.as_u64() {
                Some(u) => u,
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f > 0.0 => f as u64,
                    _ => return Err(invalid()),
                },
            };
            if limit == 0 {
                return Err(invalid());
            }
            u32::try_from(limit).map_err(|_| invalid())
        }
        Some(_) => Err(invalid()),
    }
}

/// Helper to get a collection path argument.
///
/// Nested collections (`users/alice/posts`) are allowed; the path must have an
/// odd number of non-empty segments.
pub fn get_collection_arg(args: &Map<String, JsonValue>) -> Result<String> {
    let collection = get_string_arg(args, "collection")?;
    let segments: Vec<&str> = collection.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) || segments.len() % 2 == 0 {
        return Err(McpError::InvalidArg {
            name: "collection".to_string(),
            reason: format!("'{}' is not a valid collection path", collection),
        });
    }
    Ok(collection)
}

/// Helper to get a document id argument.
pub fn get_doc_id_arg(args: &Map<String, JsonValue>) -> Result<String> {
    let id = get_string_arg(args, "docId")?;
    validate_doc_id(&id)?;
    Ok(id)
}

/// Helper to get an optional document id argument.
pub fn get_optional_doc_id(args: &Map<String, JsonValue>) -> Result<Option<String>> {
    match get_optional_string(args, "docId") {
        Some(id) => {
            validate_doc_id(&id)?;
            Ok(Some(id))
        }
        None => Ok(None),
    }
}

fn validate_doc_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') || id == "." || id == ".." {
        return Err(McpError::InvalidArg {
            name: "docId".to_string(),
            reason: format!("'{}' is not a valid document id", id),
        });
    }
    Ok(())
}
