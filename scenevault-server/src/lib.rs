//! HTTP/SSE boundary for the video processing pipeline and job scheduler.
//! Exposed as a library so integration tests can drive the real router with
//! `tower::ServiceExt` instead of a copy built only for `main`.

pub mod app_state;
pub mod config;
pub mod errors;
pub mod routes;
pub mod transcoder;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the full Axum app: versioned API router plus CORS/tracing layers.
pub fn create_app(state: AppState) -> Router {
    routes::create_api_router()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
