//! Firestore REST v1 client.
//!
//! Talks to `firestore.googleapis.com` with Application Default Credentials,
//! or to a local emulator when `FIRESTORE_EMULATOR_HOST` is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gcp_auth::TokenProvider;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, trace};

use super::codec::{
    document_id_from_name, dotted_field_path, fields_to_firestore, firestore_fields_to_json,
    json_to_firestore, merge_field_paths, update_field_paths,
};
use super::{CollectionQuery, Document, DocumentStore, FieldFilter, Fields, FilterOperator, WriteMode};
use crate::error::{McpError, Result};

const PRODUCTION_URL: &str = "https://firestore.googleapis.com/v1/";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const DEFAULT_DATABASE: &str = "(default)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_PAGE_SIZE: u32 = 300;

/// Connection settings for `FirestoreStore`.
#[derive(Debug, Clone)]
pub struct FirestoreStoreOptions {
    project_id: String,
    database_id: String,
    emulator_host: Option<String>,
    timeout: Duration,
}

impl FirestoreStoreOptions {
    /// Options for the default database of `project_id`.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: DEFAULT_DATABASE.to_string(),
            emulator_host: None,
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Use a named database instead of `(default)`.
    pub fn database(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    /// Send requests to an emulator (`host:port`) without credentials.
    pub fn emulator_host(mut self, host: Option<String>) -> Self {
        self.emulator_host = host.filter(|h| !h.trim().is_empty());
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

enum Auth {
    Emulator,
    Adc(Arc<dyn TokenProvider>),
}

/// `DocumentStore` backed by the Firestore REST API.
pub struct FirestoreStore {
    client: Client,
    documents_url: Url,
    auth: Auth,
}

impl FirestoreStore {
    /// Build the client and, outside the emulator, acquire a credentials provider.
    pub async fn connect(options: FirestoreStoreOptions) -> Result<Self> {
        let client = Client::builder().timeout(options.timeout).build()?;

        let (base, auth) = match &options.emulator_host {
            Some(host) => {
                let base = if host.starts_with("http://") || host.starts_with("https://") {
                    format!("{}/v1/", host.trim_end_matches('/'))
                } else {
                    format!("http://{}/v1/", host)
                };
                debug!(emulator = %host, "using Firestore emulator");
                (base, Auth::Emulator)
            }
            None => {
                let provider = gcp_auth::provider().await?;
                (PRODUCTION_URL.to_string(), Auth::Adc(provider))
            }
        };

        let mut documents_url = Url::parse(&base)
            .map_err(|e| McpError::Internal(format!("invalid Firestore URL '{}': {}", base, e)))?;
        push_segments(
            &mut documents_url,
            [
                "projects",
                options.project_id.as_str(),
                "databases",
                options.database_id.as_str(),
                "documents",
            ],
        )?;

        Ok(Self {
            client,
            documents_url,
            auth,
        })
    }

    /// URL of a collection or document path below the documents root.
    fn path_url(&self, path: &[&str]) -> Result<Url> {
        let mut url = self.documents_url.clone();
        push_segments(&mut url, path.iter().copied())?;
        Ok(url)
    }

    /// URL of `{parent}:{method}`, e.g. `.../documents:runQuery`.
    fn method_url(&self, parent: &[&str], method: &str) -> Result<Url> {
        let mut url = self.path_url(parent)?;
        let last = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string)
            .ok_or_else(|| McpError::Internal("Firestore URL has no path".to_string()))?;
        url.path_segments_mut()
            .map_err(|_| McpError::Internal("Firestore URL cannot be a base".to_string()))?
            .pop()
            .push(&format!("{}:{}", last, method));
        Ok(url)
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url> {
        let mut path: Vec<&str> = collection.split('/').collect();
        path.push(id);
        self.path_url(&path)
    }

    /// Attach credentials and send.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match &self.auth {
            Auth::Emulator => request.bearer_auth("owner"),
            Auth::Adc(provider) => {
                let token = provider.token(&[DATASTORE_SCOPE]).await?;
                request.bearer_auth(token.as_str())
            }
        };
        Ok(request.send().await?)
    }

    /// Send and turn non-2xx responses into errors.
    async fn send_checked(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.send(request).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn list_collection_page(&self, page_size: u32, page_token: Option<&str>) -> Result<(Vec<String>, Option<String>)> {
        let url = self.method_url(&[], "listCollectionIds")?;
        let mut body = Map::new();
        body.insert("pageSize".to_string(), page_size.into());
        if let Some(token) = page_token {
            body.insert("pageToken".to_string(), token.into());
        }

        let response: JsonValue = self
            .send_checked(self.client.post(url).json(&body))
            .await?
            .json()
            .await?;

        let ids = response
            .get("collectionIds")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let next = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Ok((ids, next))
    }

    async fn patch(&self, collection: &str, id: &str, data: &Fields, params: Vec<(&str, String)>) -> Result<()> {
        let url = self.document_url(collection, id)?;
        let body = serde_json::json!({ "fields": fields_to_firestore(data) });
        trace!(url = %url, params = ?params, "PATCH document");
        self.send_checked(self.client.patch(url).query(&params).json(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn ping(&self) -> Result<()> {
        self.list_collection_page(1, None).await.map(|_| ())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut collections = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let (ids, next) = self.list_collection_page(LIST_PAGE_SIZE, token.as_deref()).await?;
            collections.extend(ids);
            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(collections)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = self.document_url(collection, id)?;
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: JsonValue = response.json().await?;
        Ok(parse_document(&body))
    }

    async fn query(&self, query: &CollectionQuery) -> Result<Vec<Document>> {
        let (parent, collection_id) = split_collection_path(&query.collection);
        let url = self.method_url(&parent, "runQuery")?;

        let mut structured = Map::new();
        structured.insert(
            "from".to_string(),
            serde_json::json!([{ "collectionId": collection_id }]),
        );
        if let Some(filter) = &query.filter {
            structured.insert("where".to_string(), filter_to_rest(filter));
        }
        if let Some(order) = &query.order_by {
            structured.insert(
                "orderBy".to_string(),
                serde_json::json!([{
                    "field": { "fieldPath": dotted_field_path(&order.field) },
                    "direction": order.direction.rest_name(),
                }]),
            );
        }
        structured.insert("limit".to_string(), query.limit.into());

        let body = serde_json::json!({ "structuredQuery": structured });
        trace!(url = %url, body = %body, "runQuery");

        let results: Vec<JsonValue> = self
            .send_checked(self.client.post(url).json(&body))
            .await?
            .json()
            .await?;

        Ok(results
            .iter()
            .filter_map(|r| r.get("document"))
            .filter_map(parse_document)
            .collect())
    }

    async fn create_document(&self, collection: &str, id: Option<&str>, data: Fields) -> Result<String> {
        match id {
            Some(id) => {
                // No update mask: the whole document is replaced, or created
                self.patch(collection, id, &data, Vec::new()).await?;
                Ok(id.to_string())
            }
            None => {
                let url = self.path_url(&collection.split('/').collect::<Vec<_>>())?;
                let body = serde_json::json!({ "fields": fields_to_firestore(&data) });
                let created: JsonValue = self
                    .send_checked(self.client.post(url).json(&body))
                    .await?
                    .json()
                    .await?;
                created
                    .get("name")
                    .and_then(|v| v.as_str())
                    .map(|name| document_id_from_name(name).to_string())
                    .ok_or_else(|| McpError::Internal("created document has no name".to_string()))
            }
        }
    }

    async fn write_document(&self, collection: &str, id: &str, data: Fields, mode: WriteMode) -> Result<()> {
        match mode {
            WriteMode::Merge => {
                let params = merge_field_paths(&data)
                    .into_iter()
                    .map(|p| ("updateMask.fieldPaths", p))
                    .collect();
                self.patch(collection, id, &data, params).await
            }
            WriteMode::Update => {
                let mut params: Vec<(&str, String)> = update_field_paths(&data)
                    .into_iter()
                    .map(|p| ("updateMask.fieldPaths", p))
                    .collect();
                params.push(("currentDocument.exists", "true".to_string()));
                match self.patch(collection, id, &data, params).await {
                    Err(McpError::Firestore { code, .. }) if code == "NOT_FOUND" => {
                        Err(McpError::NotFound(format!("{}/{}", collection, id)))
                    }
                    other => other,
                }
            }
        }
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let url = self.document_url(collection, id)?;
        self.send_checked(self.client.delete(url)).await?;
        Ok(())
    }
}

fn push_segments<'a, I>(url: &mut Url, segments: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    url.path_segments_mut()
        .map_err(|_| McpError::Internal("Firestore URL cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(())
}

/// Split `users/alice/posts` into parent `["users", "alice"]` and id `posts`.
fn split_collection_path(collection: &str) -> (Vec<&str>, &str) {
    let mut segments: Vec<&str> = collection.split('/').collect();
    let id = segments.pop().unwrap_or(collection);
    (segments, id)
}

fn filter_to_rest(filter: &FieldFilter) -> JsonValue {
    let field = serde_json::json!({ "fieldPath": dotted_field_path(&filter.field) });

    // Null comparisons must use unary filters
    let unary = match (filter.op, &filter.value) {
        (FilterOperator::Equal, JsonValue::Null) => Some("IS_NULL"),
        (FilterOperator::NotEqual, JsonValue::Null) => Some("IS_NOT_NULL"),
        _ => None,
    };

    match unary {
        Some(op) => serde_json::json!({ "unaryFilter": { "op": op, "field": field } }),
        None => serde_json::json!({
            "fieldFilter": {
                "field": field,
                "op": filter.op.rest_name(),
                "value": json_to_firestore(&filter.value),
            }
        }),
    }
}

fn parse_document(doc: &JsonValue) -> Option<Document> {
    let name = doc.get("name")?.as_str()?;
    Some(Document {
        id: document_id_from_name(name).to_string(),
        data: firestore_fields_to_json(doc.get("fields")),
    })
}

/// Build an error from a failed response body, e.g.
/// `{"error": {"code": 404, "status": "NOT_FOUND", "message": "..."}}`.
async fn error_from_response(response: Response) -> McpError {
    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return McpError::Http(e.to_string()),
    };

    let body: JsonValue = serde_json::from_str(&text).unwrap_or(JsonValue::Null);
    // runQuery reports errors inside a one-element array
    let error = match &body {
        JsonValue::Array(items) => items.first().and_then(|item| item.get("error")),
        other => other.get("error"),
    };

    let code = error
        .and_then(|e| e.get("status"))
        .and_then(|s| s.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| status_name(status).to_string());
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text.clone() });

    debug!(status = %status, code = %code, "Firestore request failed");
    McpError::Firestore { code, message }
}

fn status_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "INVALID_ARGUMENT",
        StatusCode::UNAUTHORIZED => "UNAUTHENTICATED",
        StatusCode::FORBIDDEN => "PERMISSION_DENIED",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::CONFLICT => "ALREADY_EXISTS",
        StatusCode::PRECONDITION_FAILED => "FAILED_PRECONDITION",
        StatusCode::TOO_MANY_REQUESTS => "RESOURCE_EXHAUSTED",
        StatusCode::SERVICE_UNAVAILABLE => "UNAVAILABLE",
        StatusCode::GATEWAY_TIMEOUT => "DEADLINE_EXCEEDED",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OrderDirection;
    use serde_json::json;

    async fn emulator_store() -> FirestoreStore {
        FirestoreStore::connect(
            FirestoreStoreOptions::new("demo-project").emulator_host(Some("localhost:8080".to_string())),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_emulator_urls() {
        let store = emulator_store().await;
        assert_eq!(
            store.document_url("users", "alice").unwrap().as_str(),
            "http://localhost:8080/v1/projects/demo-project/databases/(default)/documents/users/alice"
        );
        assert_eq!(
            store.method_url(&[], "runQuery").unwrap().as_str(),
            "http://localhost:8080/v1/projects/demo-project/databases/(default)/documents:runQuery"
        );
        assert_eq!(
            store.method_url(&["users", "alice"], "runQuery").unwrap().as_str(),
            "http://localhost:8080/v1/projects/demo-project/databases/(default)/documents/users/alice:runQuery"
        );
    }

    #[tokio::test]
    async fn test_document_ids_are_escaped() {
        let store = emulator_store().await;
        let url = store.document_url("users", "a b?c").unwrap();
        assert!(url.as_str().ends_with("/users/a%20b%3Fc"));
    }

    #[test]
    fn test_split_collection_path() {
        assert_eq!(split_collection_path("users"), (vec![], "users"));
        assert_eq!(
            split_collection_path("users/alice/posts"),
            (vec!["users", "alice"], "posts")
        );
    }

    #[test]
    fn test_filter_to_rest() {
        let filter = FieldFilter {
            field: "stats.age".to_string(),
            op: FilterOperator::GreaterThanOrEqual,
            value: json!(21),
        };
        assert_eq!(
            filter_to_rest(&filter),
            json!({
                "fieldFilter": {
                    "field": {"fieldPath": "stats.age"},
                    "op": "GREATER_THAN_OR_EQUAL",
                    "value": {"integerValue": "21"}
                }
            })
        );

        let null_filter = FieldFilter {
            field: "deletedAt".to_string(),
            op: FilterOperator::Equal,
            value: JsonValue::Null,
        };
        assert_eq!(
            filter_to_rest(&null_filter)["unaryFilter"]["op"],
            json!("IS_NULL")
        );
    }

    #[test]
    fn test_parse_document() {
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/users/alice",
            "fields": {"age": {"integerValue": "30"}},
            "createTime": "2024-01-01T00:00:00Z"
        });
        let parsed = parse_document(&doc).unwrap();
        assert_eq!(parsed.id, "alice");
        assert_eq!(JsonValue::Object(parsed.data), json!({"age": 30}));
        assert!(parse_document(&json!({"readTime": "x"})).is_none());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(status_name(StatusCode::NOT_FOUND), "NOT_FOUND");
        assert_eq!(status_name(StatusCode::IM_A_TEAPOT), "UNKNOWN");
        assert_eq!(OrderDirection::Descending.rest_name(), "DESCENDING");
    }
}
