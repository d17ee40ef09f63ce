//! In-process document store.
//!
//! Mirrors the Firestore behaviour the tools rely on (auto ids, merge vs.
//! update writes, single-field filters, ordering across value types) without
//! any network access.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use super::{CollectionQuery, Document, DocumentStore, FieldFilter, Fields, FilterOperator, OrderDirection, WriteMode};
use crate::error::{McpError, Result};

const AUTO_ID_LEN: usize = 20;

/// Generate a Firestore-style document id: 20 alphanumeric characters.
pub fn auto_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// Document store held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Fields>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        // Subcollection paths count towards their root collection
        let roots: BTreeSet<&str> = collections
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .filter_map(|(path, _)| path.split('/').next())
            .collect();
        Ok(roots.into_iter().map(str::to_string).collect())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn query(&self, query: &CollectionQuery) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        // BTreeMap iteration gives document id order, which is also the tie-break
        let mut matches: Vec<(&String, &Fields)> = docs
            .iter()
            .filter(|(_, data)| query.filter.as_ref().map_or(true, |f| matches_filter(data, f)))
            .collect();

        // An inequality filter orders by its field unless an explicit order is given
        let order = match (&query.order_by, &query.filter) {
            (Some(order), _) => Some((order.field.as_str(), order.direction)),
            (None, Some(filter)) if filter.op.is_inequality() => {
                Some((filter.field.as_str(), OrderDirection::Ascending))
            }
            _ => None,
        };

        if let Some((field, direction)) = order {
            matches.retain(|(_, data)| lookup_field(data, field).is_some());
            matches.sort_by(|(id_a, a), (id_b, b)| {
                let ord = match (lookup_field(a, field), lookup_field(b, field)) {
                    (Some(x), Some(y)) => compare_values(x, y),
                    _ => Ordering::Equal,
                };
                let ord = match direction {
                    OrderDirection::Ascending => ord,
                    OrderDirection::Descending => ord.reverse(),
                };
                ord.then_with(|| id_a.cmp(id_b))
            });
        }

        Ok(matches
            .into_iter()
            .take(query.limit as usize)
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn create_document(&self, collection: &str, id: Option<&str>, data: Fields) -> Result<String> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let id = match id {
            Some(id) => id.to_string(),
            None => loop {
                let candidate = auto_id();
                if !docs.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        docs.insert(id.clone(), data);
        Ok(id)
    }

    async fn write_document(&self, collection: &str, id: &str, data: Fields, mode: WriteMode) -> Result<()> {
        let mut collections = self.collections.write().await;

        match mode {
            WriteMode::Merge => {
                let doc = collections
                    .entry(collection.to_string())
                    .or_default()
                    .entry(id.to_string())
                    .or_default();
                merge_fields(doc, data);
            }
            WriteMode::Update => {
                let doc = collections
                    .get_mut(collection)
                    .and_then(|docs| docs.get_mut(id))
                    .ok_or_else(|| McpError::NotFound(format!("{}/{}", collection, id)))?;
                for (k, v) in data {
                    doc.insert(k, v);
                }
            }
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
            if docs.is_empty() {
                collections.remove(collection);
            }
        }
        Ok(())
    }
}

/// Deep-merge `incoming` into `target`: non-empty nested maps merge, everything else replaces.
fn merge_fields(target: &mut Fields, incoming: Fields) {
    for (k, v) in incoming {
        match v {
            // An empty map is written as a value, replacing whatever was there
            JsonValue::Object(nested) if !nested.is_empty() => {
                if let Some(JsonValue::Object(existing)) = target.get_mut(&k) {
                    merge_fields(existing, nested);
                } else {
                    target.insert(k, JsonValue::Object(nested));
                }
            }
            v => {
                target.insert(k, v);
            }
        }
    }
}

/// Resolve a dot-separated field path.
fn lookup_field<'a>(data: &'a Fields, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn matches_filter(data: &Fields, filter: &FieldFilter) -> bool {
    let Some(field) = lookup_field(data, &filter.field) else {
        return false;
    };
    let operand = &filter.value;
    let operands = || operand.as_array().map(Vec::as_slice).unwrap_or(&[]);

    match filter.op {
        FilterOperator::Equal => values_equal(field, operand),
        FilterOperator::NotEqual => !field.is_null() && !values_equal(field, operand),
        FilterOperator::LessThan => range_cmp(field, operand).is_some_and(Ordering::is_lt),
        FilterOperator::LessThanOrEqual => range_cmp(field, operand).is_some_and(Ordering::is_le),
        FilterOperator::GreaterThan => range_cmp(field, operand).is_some_and(Ordering::is_gt),
        FilterOperator::GreaterThanOrEqual => range_cmp(field, operand).is_some_and(Ordering::is_ge),
        FilterOperator::ArrayContains => field
            .as_array()
            .is_some_and(|items| items.iter().any(|item| values_equal(item, operand))),
        FilterOperator::ArrayContainsAny => field.as_array().is_some_and(|items| {
            items
                .iter()
                .any(|item| operands().iter().any(|candidate| values_equal(item, candidate)))
        }),
        FilterOperator::In => operands().iter().any(|candidate| values_equal(field, candidate)),
        FilterOperator::NotIn => {
            !field.is_null() && !operands().iter().any(|candidate| values_equal(field, candidate))
        }
    }
}

/// Range comparisons only match values of the same type.
fn range_cmp(field: &JsonValue, operand: &JsonValue) -> Option<Ordering> {
    if type_rank(field) == type_rank(operand) {
        Some(compare_values(field, operand))
    } else {
        None
    }
}

fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    compare_values(a, b) == Ordering::Equal
}

fn type_rank(value: &JsonValue) -> u8 {
    match value {
        JsonValue::Null => 0,
        JsonValue::Bool(_) => 1,
        JsonValue::Number(_) => 2,
        JsonValue::String(_) => 3,
        JsonValue::Array(_) => 4,
        JsonValue::Object(_) => 5,
    }
}

/// Total order across value types: null < bool < number < string < array < map.
fn compare_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(i), Some(j)) => i.cmp(&j),
                _ => {
                    let (fx, fy) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
                    fx.partial_cmp(&fy).unwrap_or(Ordering::Equal)
                }
            }
        }
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        (JsonValue::Array(x), JsonValue::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(p, q)| compare_values(p, q))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (JsonValue::Object(x), JsonValue::Object(y)) => x
            .iter()
            .zip(y.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| compare_values(va, vb)))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
