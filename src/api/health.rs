//! Health endpoint
//!
//! One route reporting liveness and whether the store is usable. The store
//! probe counts media items, so a missing or broken schema shows up as
//! degraded rather than healthy-but-empty.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub media_items: Option<i64>,
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let media_items = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM media_items")
        .fetch_one(&state.db)
        .await
        .ok();

    Json(HealthStatus {
        status: if media_items.is_some() {
            "ok"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        database: media_items.is_some(),
        media_items,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
