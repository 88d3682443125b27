pub mod admin;
pub mod events;

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

/// Creates the versioned API router: one `GET` SSE stream plus four admin
/// endpoints, all nested under `/api/v1`.
pub fn create_api_router() -> Router<AppState> {
    Router::new().nest("/api/v1", create_v1_router())
}

fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/events", get(events::events_sse_handler))
        .route("/admin/scan/start", post(admin::start_scan_handler))
        .route("/admin/scan/cancel", post(admin::cancel_scan_handler))
        .route("/admin/scan/status", get(admin::scan_status_handler))
        .route("/admin/jobs", get(admin::list_jobs_handler))
}
