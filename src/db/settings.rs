//! Application settings database operations
//!
//! Settings are a single JSON document in the `app_settings` key/value
//! table. Source folders are stored as tagged `TYPE:path` strings for
//! compatibility with existing databases and parsed into structured
//! [`SourceFolder`] values at the boundary.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use super::media_items::MediaType;
use super::sqlite_helpers::datetime_to_str;
use super::DbPool;

const SETTINGS_KEY: &str = "settings";

/// How a source folder constrains classification during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFolderKind {
    Movies,
    Tv,
    Mixed,
}

impl SourceFolderKind {
    /// Type override this folder imposes; `None` defers to the parser.
    pub fn type_override(&self) -> Option<MediaType> {
        match self {
            SourceFolderKind::Movies => Some(MediaType::Movie),
            SourceFolderKind::Tv => Some(MediaType::TvShow),
            SourceFolderKind::Mixed => None,
        }
    }
}

/// A configured scan root with its classification tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFolder {
    pub kind: SourceFolderKind,
    pub path: String,
}

impl SourceFolder {
    /// Parse the persisted `TYPE:path` form. An untagged string is MIXED.
    pub fn parse(raw: &str) -> Self {
        if let Some(path) = raw.strip_prefix("MOVIES:") {
            return Self {
                kind: SourceFolderKind::Movies,
                path: path.to_string(),
            };
        }
        if let Some(path) = raw.strip_prefix("TV:") {
            return Self {
                kind: SourceFolderKind::Tv,
                path: path.to_string(),
            };
        }
        let path = raw.strip_prefix("MIXED:").unwrap_or(raw);
        Self {
            kind: SourceFolderKind::Mixed,
            path: path.to_string(),
        }
    }

    /// Render back to the persisted `TYPE:path` form.
    pub fn to_tagged(&self) -> String {
        let tag = match self.kind {
            SourceFolderKind::Movies => "MOVIES",
            SourceFolderKind::Tv => "TV",
            SourceFolderKind::Mixed => "MIXED",
        };
        format!("{}:{}", tag, self.path)
    }
}

/// Singleton application settings record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tmdb_api_key: Option<String>,
    /// Tagged `TYPE:path` strings; see [`SourceFolder`].
    #[serde(default)]
    pub source_folders: Vec<String>,
    #[serde(default)]
    pub movies_root: Option<String>,
    #[serde(default)]
    pub tv_root: Option<String>,
    #[serde(default)]
    pub auto_organize: bool,
}

impl Settings {
    pub fn parsed_source_folders(&self) -> Vec<SourceFolder> {
        self.source_folders
            .iter()
            .map(|s| SourceFolder::parse(s))
            .collect()
    }
}

/// Settings repository for database operations
pub struct SettingsRepository {
    pool: DbPool,
}

impl SettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Load the settings document, defaulting when none has been saved yet
    pub async fn load(&self) -> Result<Settings> {
        let row = sqlx::query("SELECT value FROM app_settings WHERE key = ?1")
            .bind(SETTINGS_KEY)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: String = row.try_get("value")?;
                Ok(serde_json::from_str(&value)?)
            }
            None => Ok(Settings::default()),
        }
    }

    /// Persist the settings document
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        let value = serde_json::to_string(settings)?;

        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET
                value = ?2,
                updated_at = ?3
            "#,
        )
        .bind(SETTINGS_KEY)
        .bind(&value)
        .bind(datetime_to_str(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_folder() {
        let f = SourceFolder::parse("MOVIES:/mnt/films");
        assert_eq!(f.kind, SourceFolderKind::Movies);
        assert_eq!(f.path, "/mnt/films");

        let f = SourceFolder::parse("TV:/mnt/shows");
        assert_eq!(f.kind, SourceFolderKind::Tv);
        assert_eq!(f.path, "/mnt/shows");
    }

    #[test]
    fn test_untagged_folder_is_mixed() {
        let f = SourceFolder::parse("/downloads");
        assert_eq!(f.kind, SourceFolderKind::Mixed);
        assert_eq!(f.path, "/downloads");
        assert_eq!(f.to_tagged(), "MIXED:/downloads");
    }

    #[test]
    fn test_type_override() {
        assert_eq!(
            SourceFolderKind::Movies.type_override(),
            Some(MediaType::Movie)
        );
        assert_eq!(SourceFolderKind::Tv.type_override(), Some(MediaType::TvShow));
        assert_eq!(SourceFolderKind::Mixed.type_override(), None);
    }
}
