//! Schema bootstrap
//!
//! Creates the tables on startup when missing. Statements are idempotent so
//! the bootstrap can run on every boot; column renames or type changes are
//! not handled (requires a database wipe).

use sqlx::SqlitePool;
use tracing::debug;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS media_items (
        id TEXT PRIMARY KEY,
        original_filename TEXT NOT NULL,
        original_path TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        extension TEXT NOT NULL,
        detected_type TEXT NOT NULL DEFAULT 'unknown',
        detected_name TEXT,
        cleaned_name TEXT,
        year INTEGER,
        season INTEGER,
        episode INTEGER,
        episode_end INTEGER,
        episode_title TEXT,
        is_season_pack INTEGER NOT NULL DEFAULT 0,
        confidence INTEGER NOT NULL DEFAULT 0,
        tmdb_id INTEGER,
        tmdb_name TEXT,
        poster_path TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        destination_path TEXT,
        duplicate_of TEXT,
        manual_override INTEGER NOT NULL DEFAULT 0,
        duration REAL,
        created_at TEXT NOT NULL,
        UNIQUE(original_path, original_filename)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scan_jobs (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL DEFAULT 'pending',
        total_files INTEGER NOT NULL DEFAULT 0,
        processed_files INTEGER NOT NULL DEFAULT 0,
        new_items INTEGER NOT NULL DEFAULT 0,
        errors_count INTEGER NOT NULL DEFAULT 0,
        current_folder TEXT,
        error TEXT,
        started_at TEXT NOT NULL,
        completed_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organize_jobs (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL DEFAULT 'pending',
        total_files INTEGER NOT NULL DEFAULT 0,
        processed_files INTEGER NOT NULL DEFAULT 0,
        success_count INTEGER NOT NULL DEFAULT 0,
        failed_count INTEGER NOT NULL DEFAULT 0,
        current_file TEXT,
        error TEXT,
        started_at TEXT NOT NULL,
        completed_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tv_series (
        id TEXT PRIMARY KEY,
        tmdb_id INTEGER UNIQUE,
        name TEXT NOT NULL,
        poster_path TEXT,
        episode_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS movies (
        id TEXT PRIMARY KEY,
        tmdb_id INTEGER UNIQUE,
        title TEXT NOT NULL,
        year INTEGER,
        poster_path TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organization_logs (
        id TEXT PRIMARY KEY,
        media_item_id TEXT,
        action TEXT NOT NULL,
        source_path TEXT,
        destination_path TEXT,
        error TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_media_items_status ON media_items(status)",
    "CREATE INDEX IF NOT EXISTS idx_media_items_type ON media_items(detected_type)",
    "CREATE INDEX IF NOT EXISTS idx_org_logs_item ON organization_logs(media_item_id)",
];

/// Create all tables and indexes that do not yet exist.
pub async fn ensure_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    for stmt in STATEMENTS {
        sqlx::query(stmt).execute(pool).await?;
    }
    debug!("Schema bootstrap complete");
    Ok(())
}
