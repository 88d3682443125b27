mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

#[tokio::test]
async fn scan_status_reports_not_running_with_no_scan() {
    let state = support::test_state().await;
    let app = scenevault_server::create_app(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/admin/scan/status")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["running"], Value::Bool(false));
    assert_eq!(json["current_scan"], Value::Null);
}

#[tokio::test]
async fn starting_a_scan_with_no_registered_roots_returns_a_scan_id() {
    let state = support::test_state().await;
    let app = scenevault_server::create_app(state);

    let start_request = Request::builder()
        .method("POST")
        .uri("/api/v1/admin/scan/start")
        .body(Body::empty())
        .unwrap();
    let start_response = app.oneshot(start_request).await.unwrap();
    assert_eq!(start_response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(start_response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["scan_id"].is_string());
}

#[tokio::test]
async fn cancelling_with_nothing_running_returns_not_found() {
    let state = support::test_state().await;
    let app = scenevault_server::create_app(state);

    let cancel_request = Request::builder()
        .method("POST")
        .uri("/api/v1/admin/scan/cancel")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(cancel_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_jobs_on_an_empty_ledger_returns_empty_pages() {
    let state = support::test_state().await;
    let app = scenevault_server::create_app(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/admin/jobs?page=0&limit=10")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["jobs"], Value::Array(vec![]));
    assert_eq!(json["active_jobs"], Value::Array(vec![]));
    assert_eq!(json["page"], 0);
    assert_eq!(json["limit"], 10);
    assert!(json["queue_status"].is_object());
    assert!(json["pool_config"].is_object());
    assert!(json["retention"].is_object());
}
