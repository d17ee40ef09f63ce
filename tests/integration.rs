//! Integration tests for the tool surface, run against the in-memory store.

use std::collections::HashSet;
use std::sync::Arc;

use firestore_mcp::{McpSession, MemoryStore, ProjectSource, ResolvedProjectId, ToolRegistry};
use serde_json::{json, Map, Value as JsonValue};

/// Create a test session with an in-memory database.
fn test_session() -> McpSession {
    let project = ResolvedProjectId::new("test-project", ProjectSource::Env("GOOGLE_CLOUD_PROJECT"));
    McpSession::new(project, Arc::new(MemoryStore::new()))
}

fn to_args(args: JsonValue) -> Map<String, JsonValue> {
    match args {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    }
}

/// Helper to dispatch a tool call.
async fn call_tool(session: &McpSession, registry: &ToolRegistry, name: &str, args: JsonValue) -> JsonValue {
    registry
        .dispatch(session, name, to_args(args))
        .await
        .unwrap_or_else(|e| panic!("Tool {} failed: {}", name, e))
}

/// Helper to dispatch a tool call and expect an error.
async fn call_tool_err(
    session: &McpSession,
    registry: &ToolRegistry,
    name: &str,
    args: JsonValue,
) -> firestore_mcp::McpError {
    registry
        .dispatch(session, name, to_args(args))
        .await
        .expect_err(&format!("Expected tool {} to fail", name))
}

async fn seed_users(session: &McpSession, registry: &ToolRegistry) {
    for (id, name, age) in [("u1", "alice", 34), ("u2", "bob", 19), ("u3", "carol", 52), ("u4", "dave", 27)] {
        call_tool(
            session,
            registry,
            "create_document",
            json!({"collection": "users", "docId": id, "data": {"name": name, "age": age}}),
        )
        .await;
    }
}

fn ids(result: &JsonValue) -> Vec<String> {
    result["documents"]
        .as_array()
        .expect("Expected documents array")
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Document Tools
// =============================================================================

#[tokio::test]
async fn test_create_with_doc_id_then_get() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let result = call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "users", "docId": "alice", "data": {"name": "Alice", "age": 30}}),
    )
    .await;
    assert_eq!(result, json!({"collection": "users", "id": "alice", "operation": "created"}));

    let result = call_tool(
        &session,
        &registry,
        "get_document",
        json!({"collection": "users", "docId": "alice"}),
    )
    .await;
    assert_eq!(result["exists"], json!(true));
    assert_eq!(result["id"], json!("alice"));
    assert_eq!(result["data"], json!({"name": "Alice", "age": 30}));
}

#[tokio::test]
async fn test_create_without_doc_id_generates_distinct_ids() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let mut seen = HashSet::new();
    for i in 0..20 {
        let result = call_tool(
            &session,
            &registry,
            "create_document",
            json!({"collection": "events", "data": {"n": i}}),
        )
        .await;
        let id = result["id"].as_str().expect("Expected id string").to_string();
        assert!(!id.is_empty());
        assert!(seen.insert(id), "auto-generated id repeated");
    }

    let result = call_tool(&session, &registry, "query_collection", json!({"collection": "events", "limit": 100})).await;
    assert_eq!(result["count"], json!(20));
}

#[tokio::test]
async fn test_create_with_existing_doc_id_overwrites() {
    let session = test_session();
    let registry = ToolRegistry::new();

    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "c", "docId": "d", "data": {"a": 1, "b": 2}}),
    )
    .await;
    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "c", "docId": "d", "data": {"c": 3}}),
    )
    .await;

    let result = call_tool(&session, &registry, "get_document", json!({"collection": "c", "docId": "d"})).await;
    assert_eq!(result["data"], json!({"c": 3}));
}

#[tokio::test]
async fn test_get_missing_document() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let result = call_tool(
        &session,
        &registry,
        "get_document",
        json!({"collection": "users", "docId": "nobody"}),
    )
    .await;
    assert_eq!(result, json!({"id": "nobody", "exists": false, "data": null}));
}

#[tokio::test]
async fn test_update_merge_preserves_other_fields() {
    let session = test_session();
    let registry = ToolRegistry::new();

    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "users", "docId": "u", "data": {"name": "Ann", "profile": {"city": "Oslo", "zip": "0150"}}}),
    )
    .await;

    let result = call_tool(
        &session,
        &registry,
        "update_document",
        json!({"collection": "users", "docId": "u", "data": {"age": 41, "profile": {"city": "Bergen"}}}),
    )
    .await;
    assert_eq!(
        result,
        json!({"collection": "users", "id": "u", "operation": "updated", "merge": true})
    );

    let result = call_tool(&session, &registry, "get_document", json!({"collection": "users", "docId": "u"})).await;
    assert_eq!(
        result["data"],
        json!({"name": "Ann", "age": 41, "profile": {"city": "Bergen", "zip": "0150"}})
    );
}

#[tokio::test]
async fn test_update_merge_creates_missing_document() {
    let session = test_session();
    let registry = ToolRegistry::new();

    call_tool(
        &session,
        &registry,
        "update_document",
        json!({"collection": "settings", "docId": "theme", "data": {"dark": true}, "merge": true}),
    )
    .await;

    let result = call_tool(&session, &registry, "get_document", json!({"collection": "settings", "docId": "theme"})).await;
    assert_eq!(result["exists"], json!(true));
    assert_eq!(result["data"], json!({"dark": true}));
}

#[tokio::test]
async fn test_update_without_merge_replaces_named_fields() {
    let session = test_session();
    let registry = ToolRegistry::new();

    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "users", "docId": "u", "data": {"name": "Ann", "profile": {"city": "Oslo", "zip": "0150"}}}),
    )
    .await;

    let result = call_tool(
        &session,
        &registry,
        "update_document",
        json!({"collection": "users", "docId": "u", "data": {"profile": {"city": "Bergen"}}, "merge": false}),
    )
    .await;
    assert_eq!(result["merge"], json!(false));

    let result = call_tool(&session, &registry, "get_document", json!({"collection": "users", "docId": "u"})).await;
    assert_eq!(result["data"], json!({"name": "Ann", "profile": {"city": "Bergen"}}));
}

#[tokio::test]
async fn test_update_without_merge_requires_existing_document() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(
        &session,
        &registry,
        "update_document",
        json!({"collection": "users", "docId": "ghost", "data": {"a": 1}, "merge": false}),
    )
    .await;
    assert!(format!("{}", err).contains("not found"));

    let result = call_tool(&session, &registry, "get_document", json!({"collection": "users", "docId": "ghost"})).await;
    assert_eq!(result["exists"], json!(false));
}

#[tokio::test]
async fn test_update_rejects_empty_data() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(
        &session,
        &registry,
        "update_document",
        json!({"collection": "users", "docId": "u", "data": {}}),
    )
    .await;
    assert!(format!("{}", err).contains("data"));
}

#[tokio::test]
async fn test_delete_document() {
    let session = test_session();
    let registry = ToolRegistry::new();

    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "tmp", "docId": "x", "data": {"v": 1}}),
    )
    .await;

    let result = call_tool(&session, &registry, "delete_document", json!({"collection": "tmp", "docId": "x"})).await;
    assert_eq!(result, json!({"collection": "tmp", "id": "x", "operation": "deleted"}));

    let result = call_tool(&session, &registry, "get_document", json!({"collection": "tmp", "docId": "x"})).await;
    assert_eq!(result["exists"], json!(false));

    // Deleting again is not an error
    call_tool(&session, &registry, "delete_document", json!({"collection": "tmp", "docId": "x"})).await;
}

#[tokio::test]
async fn test_nested_collection_path() {
    let session = test_session();
    let registry = ToolRegistry::new();

    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "users/alice/posts", "docId": "p1", "data": {"title": "hi"}}),
    )
    .await;

    let result = call_tool(
        &session,
        &registry,
        "get_document",
        json!({"collection": "users/alice/posts", "docId": "p1"}),
    )
    .await;
    assert_eq!(result["data"], json!({"title": "hi"}));
}

// =============================================================================
// Collection Tools
// =============================================================================

#[tokio::test]
async fn test_list_collections() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let result = call_tool(&session, &registry, "list_collections", json!({})).await;
    assert_eq!(result, json!({"collections": []}));

    seed_users(&session, &registry).await;
    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "orders", "data": {"total": 5}}),
    )
    .await;

    let result = call_tool(&session, &registry, "list_collections", json!({})).await;
    assert_eq!(result, json!({"collections": ["orders", "users"]}));

    // Subcollections are not root collections
    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "users/u1/posts", "docId": "p1", "data": {"title": "hi"}}),
    )
    .await;
    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "teams/t1/members", "docId": "m1", "data": {"role": "lead"}}),
    )
    .await;
    let result = call_tool(&session, &registry, "list_collections", json!({})).await;
    assert_eq!(result, json!({"collections": ["orders", "teams", "users"]}));
}

#[tokio::test]
async fn test_update_merge_with_empty_map_clears_it() {
    let session = test_session();
    let registry = ToolRegistry::new();

    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "c", "docId": "d", "data": {"m": {"x": 1}, "n": 2}}),
    )
    .await;
    call_tool(
        &session,
        &registry,
        "update_document",
        json!({"collection": "c", "docId": "d", "data": {"m": {}}}),
    )
    .await;

    let result = call_tool(&session, &registry, "get_document", json!({"collection": "c", "docId": "d"})).await;
    assert_eq!(result["data"], json!({"m": {}, "n": 2}));
}

#[tokio::test]
async fn test_query_collection_default_limit() {
    let session = test_session();
    let registry = ToolRegistry::new();

    for i in 0..15 {
        call_tool(
            &session,
            &registry,
            "create_document",
            json!({"collection": "items", "docId": format!("item{:02}", i), "data": {"i": i}}),
        )
        .await;
    }

    let result = call_tool(&session, &registry, "query_collection", json!({"collection": "items"})).await;
    assert_eq!(result["collection"], json!("items"));
    assert_eq!(result["count"], json!(10));
    assert_eq!(result["documents"].as_array().unwrap().len(), 10);
    assert_eq!(result["documents"][0], json!({"id": "item00", "data": {"i": 0}}));
}

#[tokio::test]
async fn test_query_collection_ordering() {
    let session = test_session();
    let registry = ToolRegistry::new();
    seed_users(&session, &registry).await;

    let result = call_tool(
        &session,
        &registry,
        "query_collection",
        json!({"collection": "users", "orderBy": "age"}),
    )
    .await;
    assert_eq!(ids(&result), vec!["u2", "u4", "u1", "u3"]);

    let result = call_tool(
        &session,
        &registry,
        "query_collection",
        json!({"collection": "users", "orderBy": "age", "orderDirection": "desc", "limit": 2}),
    )
    .await;
    assert_eq!(result["count"], json!(2));
    assert_eq!(ids(&result), vec!["u3", "u1"]);
}

#[tokio::test]
async fn test_query_collection_order_excludes_missing_field() {
    let session = test_session();
    let registry = ToolRegistry::new();
    seed_users(&session, &registry).await;
    call_tool(
        &session,
        &registry,
        "create_document",
        json!({"collection": "users", "docId": "u5", "data": {"name": "eve"}}),
    )
    .await;

    let result = call_tool(
        &session,
        &registry,
        "query_collection",
        json!({"collection": "users", "orderBy": "age", "limit": 50}),
    )
    .await;
    assert_eq!(result["count"], json!(4));
    assert!(!ids(&result).contains(&"u5".to_string()));
}

#[tokio::test]
async fn test_query_collection_unknown_collection_is_empty() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let result = call_tool(&session, &registry, "query_collection", json!({"collection": "nothing"})).await;
    assert_eq!(result, json!({"collection": "nothing", "count": 0, "documents": []}));
}

#[tokio::test]
async fn test_query_with_where() {
    let session = test_session();
    let registry = ToolRegistry::new();
    seed_users(&session, &registry).await;

    let result = call_tool(
        &session,
        &registry,
        "query_with_where",
        json!({"collection": "users", "field": "age", "operator": ">=", "value": 27}),
    )
    .await;
    assert_eq!(result["collection"], json!("users"));
    assert_eq!(result["query"], json!("age >= 27"));
    assert_eq!(result["count"], json!(3));
    // Range filters come back ordered by the filtered field
    assert_eq!(ids(&result), vec!["u4", "u1", "u3"]);

    let result = call_tool(
        &session,
        &registry,
        "query_with_where",
        json!({"collection": "users", "field": "name", "operator": "==", "value": "bob"}),
    )
    .await;
    assert_eq!(result["query"], json!("name == bob"));
    assert_eq!(ids(&result), vec!["u2"]);
}

#[tokio::test]
async fn test_query_with_where_list_operators() {
    let session = test_session();
    let registry = ToolRegistry::new();
    seed_users(&session, &registry).await;

    let result = call_tool(
        &session,
        &registry,
        "query_with_where",
        json!({"collection": "users", "field": "name", "operator": "in", "value": ["alice", "dave", "zed"]}),
    )
    .await;
    assert_eq!(ids(&result), vec!["u1", "u4"]);

    let err = call_tool_err(
        &session,
        &registry,
        "query_with_where",
        json!({"collection": "users", "field": "name", "operator": "in", "value": "alice"}),
    )
    .await;
    assert!(format!("{}", err).contains("array"));
}

#[tokio::test]
async fn test_query_with_where_limit() {
    let session = test_session();
    let registry = ToolRegistry::new();
    seed_users(&session, &registry).await;

    // Four matches; the limit keeps the lowest ages
    let result = call_tool(
        &session,
        &registry,
        "query_with_where",
        json!({"collection": "users", "field": "age", "operator": ">", "value": 0, "limit": 1}),
    )
    .await;
    assert_eq!(result["count"], json!(1));
    assert_eq!(ids(&result), vec!["u2"]);

    let result = call_tool(
        &session,
        &registry,
        "query_with_where",
        json!({"collection": "users", "field": "name", "operator": "!=", "value": "bob", "limit": 2}),
    )
    .await;
    assert_eq!(ids(&result), vec!["u1", "u3"]);
}

#[tokio::test]
async fn test_query_description_formats_operands() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let result = call_tool(
        &session,
        &registry,
        "query_with_where",
        json!({"collection": "users", "field": "tags", "operator": "in", "value": ["a", 1]}),
    )
    .await;
    assert_eq!(result["query"], json!("tags in [\"a\",1]"));
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_unknown_tool() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(&session, &registry, "drop_database", json!({})).await;
    assert!(format!("{}", err).contains("unknown tool"));
}

#[tokio::test]
async fn test_missing_required_arg() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(&session, &registry, "get_document", json!({"collection": "users"})).await;
    let err_str = format!("{}", err);
    assert!(err_str.contains("missing") && err_str.contains("docId"));

    let err = call_tool_err(&session, &registry, "create_document", json!({"collection": "users"})).await;
    assert!(format!("{}", err).contains("data"));
}

#[tokio::test]
async fn test_invalid_arguments() {
    let session = test_session();
    let registry = ToolRegistry::new();

    let err = call_tool_err(
        &session,
        &registry,
        "query_with_where",
        json!({"collection": "users", "field": "age", "operator": "~=", "value": 1}),
    )
    .await;
    assert!(format!("{}", err).contains("operator"));

    let err = call_tool_err(
        &session,
        &registry,
        "query_collection",
        json!({"collection": "users", "orderBy": "age", "orderDirection": "sideways"}),
    )
    .await;
    assert!(format!("{}", err).contains("orderDirection"));

    let err = call_tool_err(&session, &registry, "query_collection", json!({"collection": "users", "limit": 0})).await;
    assert!(format!("{}", err).contains("limit"));

    let err = call_tool_err(
        &session,
        &registry,
        "create_document",
        json!({"collection": "users", "data": "not an object"}),
    )
    .await;
    assert!(format!("{}", err).contains("data"));
}

#[tokio::test]
async fn test_session_survives_errors() {
    let session = test_session();
    let registry = ToolRegistry::new();

    call_tool_err(&session, &registry, "get_document", json!({})).await;
    let result = call_tool(&session, &registry, "list_collections", json!({})).await;
    assert!(result["collections"].is_array());
}

// =============================================================================
// Tool Registry
// =============================================================================

#[test]
fn test_tool_count() {
    let registry = ToolRegistry::new();
    let tools = registry.tools();

    assert_eq!(
        tools.len(),
        7,
        "Expected 7 tools, got {}. Tools: {:?}",
        tools.len(),
        tools.iter().map(|t| &t.name).collect::<Vec<_>>()
    );
}

#[test]
fn test_all_tools_have_required_fields() {
    let registry = ToolRegistry::new();

    for tool in registry.tools() {
        assert!(!tool.name.is_empty(), "Tool name should not be empty");
        assert!(!tool.description.is_empty(), "Tool description should not be empty");
        assert!(tool.input_schema.is_object(), "Tool input_schema should be an object");
        assert_eq!(tool.input_schema["type"], json!("object"));
    }
}

#[test]
fn test_required_arguments_in_schema() {
    let registry = ToolRegistry::new();
    let tool = registry
        .tools()
        .iter()
        .find(|t| t.name == "update_document")
        .expect("update_document registered");

    assert_eq!(tool.input_schema["required"], json!(["collection", "docId", "data"]));
    assert_eq!(tool.input_schema["properties"]["merge"], json!({"type": "boolean"}));
}

#[test]
fn test_no_duplicate_tool_names() {
    let registry = ToolRegistry::new();
    let tools = registry.tools();
    let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    let original_count = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), original_count, "Found duplicate tool names");
}
