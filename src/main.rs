//! Curator - media ingestion and organization service
//!
//! Entry point: loads configuration, connects the store, wires the engine,
//! and serves the REST + WebSocket surface.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator::app::{build_app, AppState};
use curator::config::Config;
use curator::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curator=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Curator");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    tracing::info!("Configuration loaded");

    // Initialize database connection and schema
    let pool = db::connect_with_retry(
        &config.database_url,
        config.db_connect_timeout,
        config.db_connect_retry_delay,
    )
    .await?;
    db::schema::ensure_schema(&pool).await?;
    tracing::info!("Database connected");

    let state = AppState::new(config.clone(), pool);
    let app = build_app(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
