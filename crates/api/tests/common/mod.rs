#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use bomtree_api::config::{LogFormat, ServerConfig};
use bomtree_api::router::build_app_router;
use bomtree_api::state::AppState;
use bomtree_core::memory::InMemoryHierarchyStore;
use bomtree_core::path::SiblingIndexing;
use bomtree_core::service::BomService;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_max_connections: 1,
        sibling_indexing: SiblingIndexing::Sequence,
        audit_actor: "tester".to_string(),
        log_format: LogFormat::Pretty,
    }
}

/// Build the full application router over an in-memory store.
///
/// The store is returned too so tests can inspect rows or simulate an outage.
pub fn build_test_app() -> (Router, Arc<InMemoryHierarchyStore>) {
    let config = test_config();
    let store = Arc::new(InMemoryHierarchyStore::new());
    let state = AppState {
        bom: Arc::new(BomService::new(store.clone(), config.sibling_indexing)),
        config: Arc::new(config.clone()),
    };
    (build_app_router(state, &config), store)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
