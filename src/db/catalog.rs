//! Catalog projection repositories
//!
//! Aggregated series and movie rows maintained as a byproduct of
//! organization, keyed by TMDB id when one is known.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use super::sqlite_helpers::{datetime_to_str, decode_err, str_to_datetime, str_to_uuid, uuid_to_str};
use super::DbPool;

/// Aggregated TV series row
#[derive(Debug, Clone, Serialize)]
pub struct TvSeriesRecord {
    pub id: Uuid,
    pub tmdb_id: Option<i64>,
    pub name: String,
    pub poster_path: Option<String>,
    pub episode_count: i64,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for TvSeriesRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        let id_str: String = row.try_get("id")?;
        let created_str: String = row.try_get("created_at")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(decode_err)?,
            tmdb_id: row.try_get("tmdb_id")?,
            name: row.try_get("name")?,
            poster_path: row.try_get("poster_path")?,
            episode_count: row.try_get("episode_count")?,
            created_at: str_to_datetime(&created_str).map_err(decode_err)?,
        })
    }
}

/// Aggregated movie row
#[derive(Debug, Clone, Serialize)]
pub struct MovieRecord {
    pub id: Uuid,
    pub tmdb_id: Option<i64>,
    pub title: String,
    pub year: Option<i64>,
    pub poster_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for MovieRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        let id_str: String = row.try_get("id")?;
        let created_str: String = row.try_get("created_at")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(decode_err)?,
            tmdb_id: row.try_get("tmdb_id")?,
            title: row.try_get("title")?,
            year: row.try_get("year")?,
            poster_path: row.try_get("poster_path")?,
            created_at: str_to_datetime(&created_str).map_err(decode_err)?,
        })
    }
}

pub struct CatalogRepository {
    pool: DbPool,
}

impl CatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record one more organized episode for a series, creating the
    /// projection row on first sight.
    pub async fn record_series_episode(
        &self,
        tmdb_id: i64,
        name: &str,
        poster_path: Option<&str>,
    ) -> Result<()> {
        let existing =
            sqlx::query_as::<_, TvSeriesRecord>("SELECT * FROM tv_series WHERE tmdb_id = ?1")
                .bind(tmdb_id)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some(series) => {
                sqlx::query(
                    "UPDATE tv_series SET episode_count = episode_count + 1 WHERE id = ?1",
                )
                .bind(uuid_to_str(series.id))
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO tv_series (id, tmdb_id, name, poster_path, episode_count, created_at)
                    VALUES (?1, ?2, ?3, ?4, 1, ?5)
                    "#,
                )
                .bind(uuid_to_str(Uuid::new_v4()))
                .bind(tmdb_id)
                .bind(name)
                .bind(poster_path)
                .bind(datetime_to_str(Utc::now()))
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    /// Ensure a movie projection row exists for an organized movie.
    pub async fn record_movie(
        &self,
        tmdb_id: i64,
        title: &str,
        year: Option<i64>,
        poster_path: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO movies (id, tmdb_id, title, year, poster_path, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (tmdb_id) DO UPDATE SET
                title = ?3, year = ?4,
                poster_path = COALESCE(?5, movies.poster_path)
            "#,
        )
        .bind(uuid_to_str(Uuid::new_v4()))
        .bind(tmdb_id)
        .bind(title)
        .bind(year)
        .bind(poster_path)
        .bind(datetime_to_str(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_series(&self) -> Result<Vec<TvSeriesRecord>> {
        let records =
            sqlx::query_as::<_, TvSeriesRecord>("SELECT * FROM tv_series ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(records)
    }

    pub async fn list_movies(&self) -> Result<Vec<MovieRecord>> {
        let records = sqlx::query_as::<_, MovieRecord>("SELECT * FROM movies ORDER BY title ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}
