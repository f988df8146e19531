//! Media item endpoints: listing, stats, rescan, undo, manual edits

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::db::media_items::{
    LibraryStats, ManualEdit, MediaItemFilter, MediaItemRecord, MediaItemRepository,
};
use crate::db::logs::{OrganizationLogRecord, OrganizationLogRepository};
use crate::error::EngineError;
use crate::AppState;

use super::error_response;

/// List media items, newest first, with optional filters
async fn list_items(
    State(state): State<AppState>,
    Query(filter): Query<MediaItemFilter>,
) -> Result<Json<Vec<MediaItemRecord>>, (StatusCode, String)> {
    MediaItemRepository::new(state.db.clone())
        .list(&filter)
        .await
        .map(Json)
        .map_err(|e| error_response(EngineError::Other(e)))
}

/// Aggregate library counts
async fn stats(
    State(state): State<AppState>,
) -> Result<Json<LibraryStats>, (StatusCode, String)> {
    MediaItemRepository::new(state.db.clone())
        .stats()
        .await
        .map(Json)
        .map_err(|e| error_response(EngineError::Other(e)))
}

/// Get a single media item
async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MediaItemRecord>, (StatusCode, String)> {
    let item = MediaItemRepository::new(state.db.clone())
        .get_by_id(id)
        .await
        .map_err(|e| error_response(EngineError::Other(e)))?;

    item.map(Json)
        .ok_or_else(|| error_response(EngineError::NotFound(id)))
}

/// Reset an item so the next scan reclassifies it
async fn rescan_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MediaItemRecord>, (StatusCode, String)> {
    state
        .scanner
        .rescan_item(id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Move an organized item's file back and reset it to pending
async fn undo_organize(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MediaItemRecord>, (StatusCode, String)> {
    state
        .organizer
        .undo_organize(id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Apply a manual metadata edit; the item is locked against rescans
async fn edit_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(edit): Json<ManualEdit>,
) -> Result<Json<MediaItemRecord>, (StatusCode, String)> {
    let items = MediaItemRepository::new(state.db.clone());

    if items
        .get_by_id(id)
        .await
        .map_err(|e| error_response(EngineError::Other(e)))?
        .is_none()
    {
        return Err(error_response(EngineError::NotFound(id)));
    }

    items
        .apply_manual_edit(id, &edit)
        .await
        .map_err(|e| error_response(EngineError::Other(e)))?;

    items
        .get_by_id(id)
        .await
        .map_err(|e| error_response(EngineError::Other(e)))?
        .map(Json)
        .ok_or_else(|| error_response(EngineError::NotFound(id)))
}

/// Explicit user deletion of an item record
async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let deleted = MediaItemRepository::new(state.db.clone())
        .delete(id)
        .await
        .map_err(|e| error_response(EngineError::Other(e)))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(error_response(EngineError::NotFound(id)))
    }
}

/// Recent organization audit rows
async fn list_logs(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrganizationLogRecord>>, (StatusCode, String)> {
    OrganizationLogRepository::new(state.db.clone())
        .list_recent(200)
        .await
        .map(Json)
        .map_err(|e| error_response(EngineError::Other(e)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/media", get(list_items))
        .route("/media/stats", get(stats))
        .route(
            "/media/{id}",
            get(get_item).patch(edit_item).delete(delete_item),
        )
        .route("/media/{id}/rescan", post(rescan_item))
        .route("/media/{id}/undo", post(undo_organize))
        .route("/logs", get(list_logs))
}
