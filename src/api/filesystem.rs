//! Filesystem browsing API for server-side directory selection

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::services::filesystem::BrowseResult;
use crate::AppState;

use super::error_response;

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    /// Path to browse (defaults to /)
    #[serde(default)]
    path: String,
}

/// Browse a directory on the server, bounded by the configured allow-list
async fn browse_directory(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<BrowseResult>, (StatusCode, String)> {
    state
        .browser
        .browse(&query.path)
        .await
        .map(Json)
        .map_err(error_response)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/fs/browse", get(browse_directory))
}
