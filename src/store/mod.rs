//! Document store abstraction.
//!
//! Tools talk to Firestore through the `DocumentStore` trait so the real REST
//! client can be swapped for the in-memory store in tests.

mod codec;
mod firestore;
mod memory;

pub use codec::{document_id_from_name, json_to_firestore, firestore_to_json};
pub use firestore::{FirestoreStore, FirestoreStoreOptions};
pub use memory::MemoryStore;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::error::{McpError, Result};

/// A JSON object holding a document's fields.
pub type Fields = Map<String, JsonValue>;

/// A single stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id within its collection
    pub id: String,
    /// Document fields
    pub data: Fields,
}

impl Document {
    /// Render as `{ "id": ..., "data": {...} }`.
    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({
            "id": self.id,
            "data": self.data,
        })
    }
}

/// Comparison operator of a single-field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterThanOrEqual,
    /// `>`
    GreaterThan,
    /// `array-contains`
    ArrayContains,
    /// `array-contains-any`
    ArrayContainsAny,
    /// `in`
    In,
    /// `not-in`
    NotIn,
}

impl FilterOperator {
    /// Operators as written by clients, in the order they are documented.
    pub const SYMBOLS: [&'static str; 10] = [
        "<",
        "<=",
        "==",
        "!=",
        ">=",
        ">",
        "array-contains",
        "array-contains-any",
        "in",
        "not-in",
    ];

    /// Client-facing spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::Equal => "==",
            FilterOperator::NotEqual => "!=",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::ArrayContains => "array-contains",
            FilterOperator::ArrayContainsAny => "array-contains-any",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not-in",
        }
    }

    /// Name used by the Firestore REST API.
    pub fn rest_name(&self) -> &'static str {
        match self {
            FilterOperator::LessThan => "LESS_THAN",
            FilterOperator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            FilterOperator::Equal => "EQUAL",
            FilterOperator::NotEqual => "NOT_EQUAL",
            FilterOperator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            FilterOperator::GreaterThan => "GREATER_THAN",
            FilterOperator::ArrayContains => "ARRAY_CONTAINS",
            FilterOperator::ArrayContainsAny => "ARRAY_CONTAINS_ANY",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT_IN",
        }
    }

    /// Whether Firestore orders results by the filtered field for this operator.
    pub fn is_inequality(&self) -> bool {
        matches!(
            self,
            FilterOperator::LessThan
                | FilterOperator::LessThanOrEqual
                | FilterOperator::GreaterThan
                | FilterOperator::GreaterThanOrEqual
                | FilterOperator::NotEqual
                | FilterOperator::NotIn
        )
    }

    /// Whether the operand must be an array.
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            FilterOperator::ArrayContainsAny | FilterOperator::In | FilterOperator::NotIn
        )
    }
}

impl FromStr for FilterOperator {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "<" => Ok(FilterOperator::LessThan),
            "<=" => Ok(FilterOperator::LessThanOrEqual),
            "==" => Ok(FilterOperator::Equal),
            "!=" => Ok(FilterOperator::NotEqual),
            ">=" => Ok(FilterOperator::GreaterThanOrEqual),
            ">" => Ok(FilterOperator::GreaterThan),
            "array-contains" => Ok(FilterOperator::ArrayContains),
            "array-contains-any" => Ok(FilterOperator::ArrayContainsAny),
            "in" => Ok(FilterOperator::In),
            "not-in" => Ok(FilterOperator::NotIn),
            _ => Err(McpError::InvalidArg {
                name: "operator".to_string(),
                reason: format!(
                    "Unsupported operator '{}'. Expected one of: {}",
                    s,
                    FilterOperator::SYMBOLS.join(", ")
                ),
            }),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-field filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Field path, dot-separated for nested fields
    pub field: String,
    /// Comparison operator
    pub op: FilterOperator,
    /// Operand
    pub value: JsonValue,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

impl OrderDirection {
    /// Name used by the Firestore REST API.
    pub fn rest_name(&self) -> &'static str {
        match self {
            OrderDirection::Ascending => "ASCENDING",
            OrderDirection::Descending => "DESCENDING",
        }
    }
}

impl FromStr for OrderDirection {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(OrderDirection::Ascending),
            "desc" => Ok(OrderDirection::Descending),
            _ => Err(McpError::InvalidArg {
                name: "orderDirection".to_string(),
                reason: format!("Expected 'asc' or 'desc', got '{}'", s),
            }),
        }
    }
}

/// A sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Field path to sort on
    pub field: String,
    /// Sort direction
    pub direction: OrderDirection,
}

/// A query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    /// Collection id
    pub collection: String,
    /// Optional single-field filter
    pub filter: Option<FieldFilter>,
    /// Optional sort key
    pub order_by: Option<OrderBy>,
    /// Maximum number of documents returned
    pub limit: u32,
}

impl CollectionQuery {
    /// Query the first `limit` documents of `collection`.
    pub fn new(collection: impl Into<String>, limit: u32) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            order_by: None,
            limit,
        }
    }

    /// Restrict results with a field filter.
    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sort results on a field.
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }
}

/// How a write treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Merge supplied fields into the document, creating it if needed.
    Merge,
    /// Replace the supplied top-level fields of an existing document.
    Update,
}

/// Operations the tools need from a document database.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cheap round-trip used to verify connectivity at startup.
    async fn ping(&self) -> Result<()>;

    /// Ids of the root collections.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Fetch one document; `Ok(None)` when it doesn't exist.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Run a query and return matching documents in order.
    async fn query(&self, query: &CollectionQuery) -> Result<Vec<Document>>;

    /// Store a document, overwriting at `id` when given, else under a new id.
    /// Returns the id written.
    async fn create_document(&self, collection: &str, id: Option<&str>, data: Fields) -> Result<String>;

    /// Write fields into a document according to `mode`.
    async fn write_document(&self, collection: &str, id: &str, data: Fields, mode: WriteMode) -> Result<()>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<()>;
}
