mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

#[tokio::test]
async fn events_stream_rejects_a_missing_token() {
    let state = support::test_state().await;
    let app = scenevault_server::create_app(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/events")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn events_stream_rejects_a_wrong_token() {
    let state = support::test_state().await;
    let app = scenevault_server::create_app(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/events?token=not-the-right-token")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn events_stream_accepts_the_configured_token() {
    let state = support::test_state().await;
    let app = scenevault_server::create_app(state);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/events?token={}", support::TEST_TOKEN))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
}
