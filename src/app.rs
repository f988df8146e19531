//! Application state and HTTP router construction.
//!
//! Used by main and by the integration tests to assemble the engine around
//! an existing database pool.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::db::Database;
use crate::services::{
    FfprobeService, FilesystemBrowser, JobCoordinator, OrganizerService, ProgressBus,
    ScannerService,
};

/// Shared state for HTTP handlers and the engine services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub progress: ProgressBus,
    pub scanner: Arc<ScannerService>,
    pub organizer: Arc<OrganizerService>,
    pub browser: Arc<FilesystemBrowser>,
}

impl AppState {
    /// Wire the engine services around a connected pool
    pub fn new(config: Arc<Config>, db: Database) -> Self {
        let coordinator = JobCoordinator::new();
        let progress = ProgressBus::new();

        let scanner = Arc::new(ScannerService::new(
            db.clone(),
            coordinator.clone(),
            progress.clone(),
            FfprobeService::new(config.ffprobe_path.clone()),
            config.tmdb_api_key.clone(),
        ));
        let organizer = Arc::new(OrganizerService::new(
            db.clone(),
            coordinator.clone(),
            progress.clone(),
        ));
        let browser = Arc::new(FilesystemBrowser::new(&config.browse_roots));

        Self {
            config,
            db,
            progress,
            scanner,
            organizer,
            browser,
        }
    }
}

/// Build the full Axum router: /api, /ws, health, layers.
/// Returns Router<()> (state fully applied) for use with axum::serve.
pub fn build_app(state: AppState) -> Router<()> {
    Router::new()
        .merge(api::health::router())
        .nest(
            "/api",
            Router::new()
                .merge(api::media::router())
                .merge(api::jobs::router())
                .merge(api::settings::router())
                .merge(api::filesystem::router()),
        )
        .merge(api::ws::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
