use axum::extract::{Query, State};
use axum::Json;
use scenevault_core::{CoreError, PoolConfig, RetentionConfig, SchedulerStatus};
use scenevault_model::{JobRecord, ScanRecord};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::errors::AppError;

#[derive(Serialize)]
pub struct StartScanResponse {
    scan_id: String,
}

/// `POST /api/v1/admin/scan/start`: `{scan_id}` or `409 AlreadyRunning`.
pub async fn start_scan_handler(State(state): State<AppState>) -> Result<Json<StartScanResponse>, AppError> {
    match state.scanner.start() {
        Ok(scan_id) => Ok(Json(StartScanResponse { scan_id: scan_id.to_string() })),
        Err(CoreError::Conflict(message)) => Err(AppError::conflict(message)),
        Err(other) => Err(other.into()),
    }
}

/// `POST /api/v1/admin/scan/cancel`: `200` or `404 NotRunning`.
pub async fn cancel_scan_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    match state.scanner.cancel() {
        Ok(()) => Ok(Json(serde_json::json!({ "cancelled": true }))),
        Err(CoreError::NotFound(message)) => Err(AppError::not_found(message)),
        Err(other) => Err(other.into()),
    }
}

#[derive(Serialize)]
pub struct ScanStatusResponse {
    running: bool,
    current_scan: Option<ScanRecord>,
}

/// `GET /api/v1/admin/scan/status`: `{running, current_scan?}`.
pub async fn scan_status_handler(State(state): State<AppState>) -> Result<Json<ScanStatusResponse>, AppError> {
    let current_scan = state.scanner.status().await?;
    Ok(Json(ScanStatusResponse { running: current_scan.is_some(), current_scan }))
}

#[derive(Deserialize)]
pub struct JobsQuery {
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Serialize)]
pub struct JobsResponse {
    jobs: Vec<JobRecord>,
    page: u64,
    limit: u64,
    active_jobs: Vec<JobRecord>,
    queue_status: SchedulerStatus,
    pool_config: PoolConfig,
    retention: RetentionConfig,
}

/// `GET /api/v1/admin/jobs?page&limit`: paged Ledger entries plus
/// `active_jobs`, `queue_status`, `pool_config`, `retention`.
pub async fn list_jobs_handler(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<JobsResponse>, AppError> {
    let page = query.page.unwrap_or(0);
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let offset = page * limit;

    let jobs = state.ledger.list(offset, limit).await?;
    let active_jobs = state.ledger.active().await?;
    let queue_status = state.scheduler.status();

    Ok(Json(JobsResponse {
        jobs,
        page,
        limit,
        active_jobs,
        queue_status,
        pool_config: state.config.core.pools,
        retention: state.config.core.retention,
    }))
}
