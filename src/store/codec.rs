//! Conversion between plain JSON and Firestore REST typed values.
//!
//! Firestore's REST API wraps every value in a single-key object naming its
//! type (`{"stringValue": "x"}`, `{"mapValue": {"fields": {...}}}`, ...).

use serde_json::{Map, Value as JsonValue};

use super::Fields;

/// Convert a JSON value to a Firestore typed value.
pub fn json_to_firestore(json: &JsonValue) -> JsonValue {
    match json {
        JsonValue::Null => serde_json::json!({ "nullValue": null }),
        JsonValue::Bool(b) => serde_json::json!({ "booleanValue": b }),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                // int64 travels as a decimal string
                serde_json::json!({ "integerValue": i.to_string() })
            } else {
                serde_json::json!({ "doubleValue": n.as_f64() })
            }
        }
        JsonValue::String(s) => serde_json::json!({ "stringValue": s }),
        JsonValue::Array(arr) => {
            let values: Vec<JsonValue> = arr.iter().map(json_to_firestore).collect();
            serde_json::json!({ "arrayValue": { "values": values } })
        }
        JsonValue::Object(map) => serde_json::json!({ "mapValue": { "fields": fields_to_firestore(map) } }),
    }
}

/// Convert a document's fields to the Firestore `fields` object.
pub fn fields_to_firestore(fields: &Fields) -> JsonValue {
    let mut out = Map::new();
    for (k, v) in fields {
        out.insert(k.clone(), json_to_firestore(v));
    }
    JsonValue::Object(out)
}

/// Convert a Firestore typed value to plain JSON.
///
/// Timestamps and references become strings, geo points become
/// `{latitude, longitude}`, bytes stay base64 strings.
pub fn firestore_to_json(value: &JsonValue) -> JsonValue {
    let Some(obj) = value.as_object() else {
        return JsonValue::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return JsonValue::Null;
    };

    match kind.as_str() {
        "nullValue" => JsonValue::Null,
        "booleanValue" => JsonValue::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => match inner {
            JsonValue::String(s) => s
                .parse::<i64>()
                .map(|i| JsonValue::Number(i.into()))
                .unwrap_or_else(|_| JsonValue::String(s.clone())),
            JsonValue::Number(_) => inner.clone(),
            _ => JsonValue::Null,
        },
        "doubleValue" => match inner {
            JsonValue::Number(_) => inner.clone(),
            // NaN and the infinities have no JSON representation
            _ => JsonValue::Null,
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => serde_json::json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(JsonValue::from(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(JsonValue::from(0.0)),
        }),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().map(firestore_to_json).collect())
                .unwrap_or_default();
            JsonValue::Array(values)
        }
        "mapValue" => JsonValue::Object(firestore_fields_to_json(inner.get("fields"))),
        _ => JsonValue::Null,
    }
}

/// Convert a Firestore `fields` object (possibly absent) to document fields.
pub fn firestore_fields_to_json(fields: Option<&JsonValue>) -> Fields {
    let mut out = Map::new();
    if let Some(JsonValue::Object(map)) = fields {
        for (k, v) in map {
            out.insert(k.clone(), firestore_to_json(v));
        }
    }
    out
}

/// Last path segment of a resource name such as
/// `projects/p/databases/(default)/documents/users/alice`.
pub fn document_id_from_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Quote a field name for use in a field path when it isn't a plain identifier.
pub fn quote_field_name(name: &str) -> String {
    let mut chars = name.chars();
    let simple = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if simple {
        name.to_string()
    } else {
        let escaped = name.replace('\\', "\\\\").replace('`', "\\`");
        format!("`{}`", escaped)
    }
}

/// Turn a client-supplied dotted path (`address.city`) into a Firestore field path.
pub fn dotted_field_path(path: &str) -> String {
    path.split('.').map(quote_field_name).collect::<Vec<_>>().join(".")
}

/// Field paths touched by a merge write: every leaf, descending into non-empty maps.
pub fn merge_field_paths(fields: &Fields) -> Vec<String> {
    let mut paths = Vec::new();
    collect_leaf_paths(fields, None, &mut paths);
    paths
}

fn collect_leaf_paths(fields: &Fields, prefix: Option<&str>, out: &mut Vec<String>) {
    for (name, value) in fields {
        let path = match prefix {
            Some(p) => format!("{}.{}", p, quote_field_name(name)),
            None => quote_field_name(name),
        };
        match value {
            JsonValue::Object(nested) if !nested.is_empty() => {
                collect_leaf_paths(nested, Some(&path), out);
            }
            _ => out.push(path),
        }
    }
}

/// Field paths touched by an update write: the top-level names.
pub fn update_field_paths(fields: &Fields) -> Vec<String> {
    fields.keys().map(|k| quote_field_name(k)).collect()
}
