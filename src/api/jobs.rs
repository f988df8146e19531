//! Job endpoints: starting scans and organize batches, reading job state

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::jobs::{JobRepository, OrganizeJobRecord, ScanJobRecord};
use crate::error::EngineError;
use crate::AppState;

use super::error_response;

#[derive(Serialize)]
struct JobStarted {
    job_id: Uuid,
}

#[derive(Deserialize)]
struct OrganizeRequest {
    ids: Vec<Uuid>,
}

/// Start a scan over the configured source folders
async fn start_scan(
    State(state): State<AppState>,
) -> Result<Json<JobStarted>, (StatusCode, String)> {
    state
        .scanner
        .start_scan()
        .await
        .map(|job_id| Json(JobStarted { job_id }))
        .map_err(error_response)
}

/// Start organizing the given items, in the order supplied
async fn start_organize(
    State(state): State<AppState>,
    Json(request): Json<OrganizeRequest>,
) -> Result<Json<JobStarted>, (StatusCode, String)> {
    state
        .organizer
        .start_organize(request.ids)
        .await
        .map(|job_id| Json(JobStarted { job_id }))
        .map_err(error_response)
}

async fn get_scan_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanJobRecord>, (StatusCode, String)> {
    let job = JobRepository::new(state.db.clone())
        .get_scan_job(id)
        .await
        .map_err(|e| error_response(EngineError::Other(e)))?;

    job.map(Json)
        .ok_or_else(|| error_response(EngineError::NotFound(id)))
}

async fn get_organize_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrganizeJobRecord>, (StatusCode, String)> {
    let job = JobRepository::new(state.db.clone())
        .get_organize_job(id)
        .await
        .map_err(|e| error_response(EngineError::Other(e)))?;

    job.map(Json)
        .ok_or_else(|| error_response(EngineError::NotFound(id)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/scan", post(start_scan))
        .route("/organize", post(start_organize))
        .route("/jobs/scan/{id}", get(get_scan_job))
        .route("/jobs/organize/{id}", get(get_organize_job))
}
