use super::*;
use crate::downloader::test_helpers::{self, FakeFetch, Harness};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

mod users;

/// Router over a fresh test downloader; keep the harness alive for the tempdir
async fn test_app(script: Vec<FakeFetch>) -> (Router, Harness) {
    test_app_with(script, |_| {}).await
}

async fn test_app_with(
    script: Vec<FakeFetch>,
    tweak: impl FnOnce(&mut Config),
) -> (Router, Harness) {
    let harness = test_helpers::create_test_downloader(script).await;
    let mut config = (*harness.downloader.get_config()).clone();
    tweak(&mut config);
    let app = create_router(Arc::new(harness.downloader.clone()), Arc::new(config));
    (app, harness)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_api_server_spawns() {
    let harness = test_helpers::create_test_downloader(vec![]).await;

    let mut config = (*harness.downloader.get_config()).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let downloader = Arc::new(harness.downloader.clone());
    let api_handle = tokio::spawn(async move { start_api_server(downloader, config).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be running");
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _h) = test_app_with(vec![], |config| {
        config.api.cors_enabled = true;
        config.api.cors_origins = vec!["*".to_string()];
    })
    .await;

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_authentication_with_api_key() {
    let (app, _h) = test_app_with(vec![], |config| {
        config.api.api_key = Some("letmein".to_string());
    })
    .await;

    let (status, body) = send(&app, get("/api/v1/start")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let request = Request::builder()
        .uri("/api/v1/start")
        .header("X-Api-Key", "letmein")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_swagger_ui_toggle() {
    let (app, _h) = test_app(vec![]).await;
    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (app, _h) = test_app_with(vec![], |config| config.api.swagger_ui = false).await;
    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_routes_are_prefixed() {
    let (app, _h) = test_app(vec![]).await;
    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
