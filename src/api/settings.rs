//! Settings endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::db::settings::{Settings, SettingsRepository};
use crate::error::EngineError;
use crate::AppState;

use super::error_response;

async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<Settings>, (StatusCode, String)> {
    SettingsRepository::new(state.db.clone())
        .load()
        .await
        .map(Json)
        .map_err(|e| error_response(EngineError::Other(e)))
}

async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, (StatusCode, String)> {
    let repo = SettingsRepository::new(state.db.clone());
    repo.save(&settings)
        .await
        .map_err(|e| error_response(EngineError::Other(e)))?;

    repo.load()
        .await
        .map(Json)
        .map_err(|e| error_response(EngineError::Other(e)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(put_settings))
}
