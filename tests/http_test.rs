//! HTTP layer tests that need no database server.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use db_browser::service::BrowserService;
use db_browser::transport::router;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> axum::Router {
    router(Arc::new(BrowserService::new()))
}

async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn config() -> Value {
    json!({"server": "localhost", "database": "shop", "username": "sa", "password": "pw"})
}

#[tokio::test]
async fn test_unsupported_engine_is_bad_request() {
    let (status, body) = post(
        "/api/schema/tables",
        json!({"type": "mysql", "config": config()}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported database type: mysql");
    assert_eq!(body["details"]["code"], "unsupported_engine");
}

#[tokio::test]
async fn test_invalid_config_is_bad_request() {
    let mut cfg = config();
    cfg["server"] = json!("");
    let (status, body) = post(
        "/api/query",
        json!({"type": "sqlserver", "config": cfg, "table": "orders"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["code"], "validation");
}

#[tokio::test]
async fn test_missing_table_name_is_bad_request() {
    let (status, body) = post(
        "/api/query",
        json!({"type": "sqlserver", "config": config(), "table": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid input: Table name is required");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (status, body) = post("/api/connect", json!({"config": config()})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["code"], "validation");
    assert!(body["error"].as_str().unwrap().contains("Invalid request body"));
}

#[tokio::test]
async fn test_unknown_engine_name_is_bad_request() {
    let (status, _) = post(
        "/api/schema",
        json!({"type": "oracle", "config": config()}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/nope")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
