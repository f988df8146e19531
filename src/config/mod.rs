//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default allow-list of filesystem roots the browse API may enter.
const DEFAULT_BROWSE_ROOTS: &[&str] = &[
    "/", "/mnt", "/media", "/home", "/data", "/opt", "/srv", "/storage", "/nas", "/volume1",
    "/shares",
];

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Database URL or path (SQLite)
    /// For SQLite: use DATABASE_PATH or DATABASE_URL with sqlite:// prefix
    pub database_url: String,

    /// How long to keep retrying the initial database connection
    pub db_connect_timeout: Duration,

    /// Delay between database connection attempts
    pub db_connect_retry_delay: Duration,

    /// TMDB API key seed; the settings store takes precedence once populated
    pub tmdb_api_key: Option<String>,

    /// Path to the ffprobe binary used for duration probing
    pub ffprobe_path: String,

    /// Root prefixes the filesystem browser is allowed to enter
    pub browse_roots: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // For SQLite, prefer DATABASE_PATH, fall back to DATABASE_URL
        let mut database_url = env::var("DATABASE_PATH")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "./data/curator.db".to_string());
        if !database_url.starts_with("sqlite:") {
            database_url = format!("sqlite://{}", database_url);
        }

        let browse_roots = match env::var("BROWSE_ROOTS") {
            Ok(v) if !v.trim().is_empty() => v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => DEFAULT_BROWSE_ROOTS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url,

            db_connect_timeout: Duration::from_secs(
                env::var("DATABASE_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),

            db_connect_retry_delay: Duration::from_secs(
                env::var("DATABASE_CONNECT_RETRY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
            ),

            tmdb_api_key: env::var("TMDB_API_KEY").ok().filter(|k| !k.is_empty()),

            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),

            browse_roots,
        })
    }
}
