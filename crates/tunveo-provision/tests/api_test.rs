//! Router tests for the provisioning API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method
use tunveo_cfapi::{managed_alias, testing::InMemoryControlPlane};
use tunveo_provision::{
    models::ProvisionResponse, ApiServer, ApiServerConfig, ProvisionConfig, Provisioner,
};

fn create_test_app() -> (Arc<InMemoryControlPlane>, Router) {
    let cp = Arc::new(InMemoryControlPlane::new());
    let provisioner = Provisioner::new(cp.clone(), ProvisionConfig::new("tunnels.example.com"));
    let server = ApiServer::new(ApiServerConfig::default(), provisioner);
    (cp, server.build_router())
}

async fn read_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_root(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .uri("/")
        .method("POST")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn test_provision_auto_hostname() {
    let (cp, app) = create_test_app();

    let request_body = json!({"config": {"ingress": [
        {"hostname": "AUTO", "service": "http://localhost:8080"},
        {"service": "http_status:404"}
    ]}});

    let response = app
        .oneshot(post_root(request_body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: ProvisionResponse = serde_json::from_value(read_body(response).await).unwrap();
    assert_eq!(body.code, 200);
    assert!(!body.token.is_empty());
    assert!(body.hostname.ends_with(".tunnels.example.com"));
    assert_eq!(body.hostnames, vec![body.hostname.clone()]);

    let records = cp.dns_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, body.hostname);
    assert_eq!(records[0].content, managed_alias(body.tunnel_id.unwrap()));
}

#[tokio::test]
async fn test_oversized_body_gets_envelope() {
    let (cp, app) = create_test_app();

    let response = app
        .oneshot(post_root(vec![b'a'; 3 * 1024 * 1024]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = read_body(response).await;
    assert_eq!(body["Code"], 413);
    assert!(body["Message"].as_str().unwrap().contains("Unreadable"));
    assert!(cp.tunnels().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (cp, app) = create_test_app();

    let response = app.oneshot(post_root("{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_body(response).await;
    assert_eq!(body["Code"], 400);
    assert!(body["Message"].as_str().unwrap().contains("Malformed"));
    assert!(cp.tunnels().is_empty());
}

#[tokio::test]
async fn test_missing_catch_all_is_bad_request() {
    let (cp, app) = create_test_app();

    let request_body = json!({"config": {"ingress": [
        {"hostname": "auto", "service": "http://localhost:8080"}
    ]}});

    let response = app
        .oneshot(post_root(request_body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_body(response).await["Code"], 400);
    assert!(cp.tunnels().is_empty());
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let (cp, app) = create_test_app();
    cp.fail_put_ingress(true);

    let request_body = json!({"config": {"ingress": [
        {"hostname": "auto", "service": "http://localhost:8080"},
        {"service": "http_status:404"}
    ]}});

    let response = app
        .oneshot(post_root(request_body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = read_body(response).await;
    assert_eq!(body["Code"], 502);
    assert!(body.get("Token").is_none());

    // The tunnel stays behind for the idle reaper
    assert_eq!(cp.live_tunnels().len(), 1);
    assert!(cp.dns_records().is_empty());
}

#[tokio::test]
async fn test_get_on_root_is_not_found() {
    let (_cp, app) = create_test_app();

    let request = Request::builder()
        .uri("/")
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_body(response).await,
        json!({"Code": 404, "Message": "404 not found"})
    );
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (_cp, app) = create_test_app();

    let request = Request::builder()
        .uri("/tunnels")
        .method("POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_body(response).await["Code"], 404);
}

#[tokio::test]
async fn test_health_and_openapi() {
    let (_cp, app) = create_test_app();

    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await["status"], "healthy");

    let request = Request::builder()
        .uri("/api/openapi.json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = read_body(response).await;
    assert!(doc["paths"].get("/").is_some());
}
