//! Media items database repository
//!
//! One row per observed file. Rows are created by the scanner, mutated by
//! the scanner (respecting the manual-override lock), the organizer, manual
//! edits, undo, and rescan requests. The engine never hard-deletes rows;
//! deletion is an explicit user action.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use super::sqlite_helpers::{
    datetime_to_str, decode_err, str_to_datetime, str_to_uuid, uuid_to_str,
};
use super::DbPool;

/// Classification assigned by the parser (or a tagged source folder).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    TvShow,
    #[default]
    Unknown,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::TvShow => "tv_show",
            MediaType::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "movie" => MediaType::Movie,
            "tv_show" => MediaType::TvShow,
            _ => MediaType::Unknown,
        }
    }
}

/// Lifecycle state of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Organized,
    Skipped,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Organized => "organized",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "organized" => ItemStatus::Organized,
            "skipped" => ItemStatus::Skipped,
            "error" => ItemStatus::Error,
            _ => ItemStatus::Pending,
        }
    }
}

/// Media item record from database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaItemRecord {
    pub id: Uuid,
    pub original_filename: String,
    pub original_path: String,
    pub file_size: i64,
    pub extension: String,
    pub detected_type: MediaType,
    pub detected_name: Option<String>,
    pub cleaned_name: Option<String>,
    pub year: Option<i64>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub episode_end: Option<i64>,
    pub episode_title: Option<String>,
    pub is_season_pack: bool,
    pub confidence: i64,
    pub tmdb_id: Option<i64>,
    pub tmdb_name: Option<String>,
    pub poster_path: Option<String>,
    pub status: ItemStatus,
    pub destination_path: Option<String>,
    /// Id of the primary item when this row is a duplicate; for same-size
    /// collisions at organize time this holds the existing destination path.
    pub duplicate_of: Option<String>,
    pub manual_override: bool,
    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for MediaItemRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        let id_str: String = row.try_get("id")?;
        let type_str: String = row.try_get("detected_type")?;
        let status_str: String = row.try_get("status")?;
        let created_str: String = row.try_get("created_at")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(decode_err)?,
            original_filename: row.try_get("original_filename")?,
            original_path: row.try_get("original_path")?,
            file_size: row.try_get("file_size")?,
            extension: row.try_get("extension")?,
            detected_type: MediaType::from_str(&type_str),
            detected_name: row.try_get("detected_name")?,
            cleaned_name: row.try_get("cleaned_name")?,
            year: row.try_get("year")?,
            season: row.try_get("season")?,
            episode: row.try_get("episode")?,
            episode_end: row.try_get("episode_end")?,
            episode_title: row.try_get("episode_title")?,
            is_season_pack: row.try_get("is_season_pack")?,
            confidence: row.try_get("confidence")?,
            tmdb_id: row.try_get("tmdb_id")?,
            tmdb_name: row.try_get("tmdb_name")?,
            poster_path: row.try_get("poster_path")?,
            status: ItemStatus::from_str(&status_str),
            destination_path: row.try_get("destination_path")?,
            duplicate_of: row.try_get("duplicate_of")?,
            manual_override: row.try_get("manual_override")?,
            duration: row.try_get("duration")?,
            created_at: str_to_datetime(&created_str).map_err(decode_err)?,
        })
    }
}

/// Parsed, enriched and duplicate fields written by a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanFields {
    pub file_size: i64,
    pub detected_type: MediaType,
    pub detected_name: Option<String>,
    pub cleaned_name: Option<String>,
    pub year: Option<i64>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub episode_end: Option<i64>,
    pub episode_title: Option<String>,
    pub is_season_pack: bool,
    pub confidence: i64,
    pub tmdb_id: Option<i64>,
    pub tmdb_name: Option<String>,
    pub poster_path: Option<String>,
    pub duplicate_of: Option<Uuid>,
    pub duration: Option<f64>,
}

/// Fields a manual edit may set. Applying an edit locks the item
/// (manual_override = true, confidence = 100).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManualEdit {
    pub detected_type: Option<MediaType>,
    pub detected_name: Option<String>,
    pub cleaned_name: Option<String>,
    pub year: Option<i64>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub episode_end: Option<i64>,
    pub tmdb_id: Option<i64>,
    pub tmdb_name: Option<String>,
}

/// Filters for listing media items.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaItemFilter {
    #[serde(rename = "type")]
    pub media_type: Option<MediaType>,
    pub status: Option<ItemStatus>,
    pub search: Option<String>,
    pub confidence_below: Option<i64>,
    #[serde(default)]
    pub duplicates_only: bool,
}

/// Aggregate counts for the library overview.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryStats {
    pub total: i64,
    pub organized: i64,
    pub pending: i64,
    pub duplicates: i64,
    pub errors: i64,
    pub tv_shows: i64,
    pub movies: i64,
}

pub struct MediaItemRepository {
    pool: DbPool,
}

impl MediaItemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a media item by ID
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<MediaItemRecord>> {
        let record = sqlx::query_as::<_, MediaItemRecord>("SELECT * FROM media_items WHERE id = ?1")
            .bind(uuid_to_str(id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Look up an item by its source location
    pub async fn get_by_location(
        &self,
        original_path: &str,
        original_filename: &str,
    ) -> Result<Option<MediaItemRecord>> {
        let record = sqlx::query_as::<_, MediaItemRecord>(
            "SELECT * FROM media_items WHERE original_path = ?1 AND original_filename = ?2",
        )
        .bind(original_path)
        .bind(original_filename)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Insert a new item observed by a scan
    pub async fn insert(
        &self,
        original_path: &str,
        original_filename: &str,
        extension: &str,
        fields: &ScanFields,
    ) -> Result<MediaItemRecord> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO media_items (
                id, original_filename, original_path, file_size, extension,
                detected_type, detected_name, cleaned_name, year, season,
                episode, episode_end, episode_title, is_season_pack, confidence,
                tmdb_id, tmdb_name, poster_path, status, destination_path,
                duplicate_of, manual_override, duration, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, 'pending', NULL, ?19, 0, ?20, ?21)
            "#,
        )
        .bind(uuid_to_str(id))
        .bind(original_filename)
        .bind(original_path)
        .bind(fields.file_size)
        .bind(extension)
        .bind(fields.detected_type.as_str())
        .bind(&fields.detected_name)
        .bind(&fields.cleaned_name)
        .bind(fields.year)
        .bind(fields.season)
        .bind(fields.episode)
        .bind(fields.episode_end)
        .bind(&fields.episode_title)
        .bind(fields.is_season_pack)
        .bind(fields.confidence)
        .bind(fields.tmdb_id)
        .bind(&fields.tmdb_name)
        .bind(&fields.poster_path)
        .bind(fields.duplicate_of.map(uuid_to_str))
        .bind(fields.duration)
        .bind(datetime_to_str(Utc::now()))
        .execute(&self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to read media item back after insert"))
    }

    /// Refresh all scan-derived fields on an unlocked item
    pub async fn update_scan_fields(&self, id: Uuid, fields: &ScanFields) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE media_items SET
                file_size = ?2, detected_type = ?3, detected_name = ?4,
                cleaned_name = ?5, year = ?6, season = ?7, episode = ?8,
                episode_end = ?9, episode_title = ?10, is_season_pack = ?11,
                confidence = ?12, tmdb_id = ?13, tmdb_name = ?14,
                poster_path = ?15, duplicate_of = ?16, duration = ?17
            WHERE id = ?1
            "#,
        )
        .bind(uuid_to_str(id))
        .bind(fields.file_size)
        .bind(fields.detected_type.as_str())
        .bind(&fields.detected_name)
        .bind(&fields.cleaned_name)
        .bind(fields.year)
        .bind(fields.season)
        .bind(fields.episode)
        .bind(fields.episode_end)
        .bind(&fields.episode_title)
        .bind(fields.is_season_pack)
        .bind(fields.confidence)
        .bind(fields.tmdb_id)
        .bind(&fields.tmdb_name)
        .bind(&fields.poster_path)
        .bind(fields.duplicate_of.map(uuid_to_str))
        .bind(fields.duration)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Refresh only the file size (locked items)
    pub async fn update_file_size(&self, id: Uuid, file_size: i64) -> Result<()> {
        sqlx::query("UPDATE media_items SET file_size = ?2 WHERE id = ?1")
            .bind(uuid_to_str(id))
            .bind(file_size)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Primaries of a given type, in insertion order, for duplicate matching
    pub async fn list_primaries(&self, media_type: MediaType) -> Result<Vec<MediaItemRecord>> {
        let records = sqlx::query_as::<_, MediaItemRecord>(
            r#"
            SELECT * FROM media_items
            WHERE detected_type = ?1 AND duplicate_of IS NULL
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(media_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// List items, newest first, with optional filters
    pub async fn list(&self, filter: &MediaItemFilter) -> Result<Vec<MediaItemRecord>> {
        let mut sql = String::from("SELECT * FROM media_items WHERE 1=1");
        if filter.media_type.is_some() {
            sql.push_str(" AND detected_type = ?");
        }
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.search.is_some() {
            sql.push_str(
                " AND (original_filename LIKE ? OR detected_name LIKE ? \
                 OR cleaned_name LIKE ? OR tmdb_name LIKE ?)",
            );
        }
        if filter.confidence_below.is_some() {
            sql.push_str(" AND confidence < ?");
        }
        if filter.duplicates_only {
            sql.push_str(" AND duplicate_of IS NOT NULL");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query_as::<_, MediaItemRecord>(&sql);
        if let Some(t) = filter.media_type {
            query = query.bind(t.as_str());
        }
        if let Some(s) = filter.status {
            query = query.bind(s.as_str());
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{}%", search);
            query = query
                .bind(pattern.clone())
                .bind(pattern.clone())
                .bind(pattern.clone())
                .bind(pattern);
        }
        if let Some(c) = filter.confidence_below {
            query = query.bind(c);
        }

        let records = query.fetch_all(&self.pool).await?;

        Ok(records)
    }

    /// Aggregate counts for the overview endpoint
    pub async fn stats(&self) -> Result<LibraryStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                SUM(CASE WHEN status = 'organized' THEN 1 ELSE 0 END) AS organized,
                SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END) AS pending,
                SUM(CASE WHEN duplicate_of IS NOT NULL THEN 1 ELSE 0 END) AS duplicates,
                SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END) AS errors,
                SUM(CASE WHEN detected_type = 'tv_show' THEN 1 ELSE 0 END) AS tv_shows,
                SUM(CASE WHEN detected_type = 'movie' THEN 1 ELSE 0 END) AS movies
            FROM media_items
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(LibraryStats {
            total: row.try_get::<i64, _>("total")?,
            organized: row.try_get::<Option<i64>, _>("organized")?.unwrap_or(0),
            pending: row.try_get::<Option<i64>, _>("pending")?.unwrap_or(0),
            duplicates: row.try_get::<Option<i64>, _>("duplicates")?.unwrap_or(0),
            errors: row.try_get::<Option<i64>, _>("errors")?.unwrap_or(0),
            tv_shows: row.try_get::<Option<i64>, _>("tv_shows")?.unwrap_or(0),
            movies: row.try_get::<Option<i64>, _>("movies")?.unwrap_or(0),
        })
    }

    /// Mark an item organized at its final destination
    pub async fn mark_organized(&self, id: Uuid, destination_path: &str) -> Result<()> {
        sqlx::query(
            "UPDATE media_items SET status = 'organized', destination_path = ?2 WHERE id = ?1",
        )
        .bind(uuid_to_str(id))
        .bind(destination_path)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark an item skipped due to a same-size collision; `duplicate_of`
    /// records the existing destination path.
    pub async fn mark_skipped(&self, id: Uuid, existing_destination: &str) -> Result<()> {
        sqlx::query("UPDATE media_items SET status = 'skipped', duplicate_of = ?2 WHERE id = ?1")
            .bind(uuid_to_str(id))
            .bind(existing_destination)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Mark an item failed
    pub async fn mark_error(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE media_items SET status = 'error' WHERE id = ?1")
            .bind(uuid_to_str(id))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Clear enrichment and duplicate state so the next scan reclassifies
    /// the item from scratch.
    pub async fn reset_for_rescan(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE media_items SET
                tmdb_id = NULL, tmdb_name = NULL, poster_path = NULL,
                episode_title = NULL, duplicate_of = NULL, status = 'pending'
            WHERE id = ?1
            "#,
        )
        .bind(uuid_to_str(id))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Revert the bookkeeping after an undo moved the file back
    pub async fn reset_after_undo(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE media_items SET status = 'pending', destination_path = NULL WHERE id = ?1",
        )
        .bind(uuid_to_str(id))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Apply a manual edit and lock the item against rescans
    pub async fn apply_manual_edit(&self, id: Uuid, edit: &ManualEdit) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE media_items SET
                detected_type = COALESCE(?2, detected_type),
                detected_name = COALESCE(?3, detected_name),
                cleaned_name = COALESCE(?4, cleaned_name),
                year = COALESCE(?5, year),
                season = COALESCE(?6, season),
                episode = COALESCE(?7, episode),
                episode_end = COALESCE(?8, episode_end),
                tmdb_id = COALESCE(?9, tmdb_id),
                tmdb_name = COALESCE(?10, tmdb_name),
                manual_override = 1,
                confidence = 100
            WHERE id = ?1
            "#,
        )
        .bind(uuid_to_str(id))
        .bind(edit.detected_type.map(|t| t.as_str()))
        .bind(&edit.detected_name)
        .bind(&edit.cleaned_name)
        .bind(edit.year)
        .bind(edit.season)
        .bind(edit.episode)
        .bind(edit.episode_end)
        .bind(edit.tmdb_id)
        .bind(&edit.tmdb_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Explicit user deletion of an item record
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_items WHERE id = ?1")
            .bind(uuid_to_str(id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
