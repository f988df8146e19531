pub mod catalog;
pub mod jobs;
pub mod logs;
pub mod media_items;
pub mod schema;
pub mod settings;
pub mod sqlite_helpers;

pub type DbPool = sqlx::SqlitePool;
pub type Database = sqlx::SqlitePool;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use sqlx::sqlite::SqliteConnectOptions;
use tokio::time::sleep;
use tracing::warn;

pub use catalog::CatalogRepository;
pub use jobs::JobRepository;
pub use logs::OrganizationLogRepository;
pub use media_items::MediaItemRepository;
pub use settings::SettingsRepository;

/// Connect to the SQLite store, retrying until `timeout` elapses. Creates
/// the database file and its parent directory when missing. The timeout and
/// retry cadence come from [`Config`](crate::config::Config).
pub async fn connect_with_retry(
    url: &str,
    timeout: Duration,
    retry_delay: Duration,
) -> anyhow::Result<Database> {
    let opts = url
        .parse::<SqliteConnectOptions>()
        .with_context(|| format!("invalid database URL {}", url))?
        .create_if_missing(true);

    create_parent_dir(&opts)?;

    let deadline = Instant::now() + timeout;
    let mut attempt = 1u32;
    loop {
        match Database::connect_with(opts.clone()).await {
            Ok(pool) => return Ok(pool),
            Err(e) if Instant::now() + retry_delay < deadline => {
                warn!(attempt, error = %e, "Database not ready, retrying");
                sleep(retry_delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("database connection gave up after {} attempts", attempt)
                });
            }
        }
    }
}

/// Ensure the directory that will hold a file-backed database exists.
/// In-memory databases have no parent to create.
fn create_parent_dir(opts: &SqliteConnectOptions) -> anyhow::Result<()> {
    let filename = opts.get_filename();
    if filename.as_os_str().is_empty() || filename == Path::new(":memory:") {
        return Ok(());
    }
    if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(())
}
