//! Scan and organize job database operations
//!
//! One row per batch operation. Counters only move forward; terminal states
//! (`completed`, `failed`) are never rewritten.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use super::sqlite_helpers::{
    datetime_to_str, decode_err, str_to_datetime, str_to_datetime_opt, str_to_uuid, uuid_to_str,
};
use super::DbPool;

/// Lifecycle state of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Scan job record from database
#[derive(Debug, Clone, Serialize)]
pub struct ScanJobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub total_files: i64,
    pub processed_files: i64,
    pub new_items: i64,
    pub errors_count: i64,
    pub current_folder: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for ScanJobRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        let id_str: String = row.try_get("id")?;
        let status_str: String = row.try_get("status")?;
        let started_str: String = row.try_get("started_at")?;
        let completed_str: Option<String> = row.try_get("completed_at")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(decode_err)?,
            status: JobStatus::from_str(&status_str),
            total_files: row.try_get("total_files")?,
            processed_files: row.try_get("processed_files")?,
            new_items: row.try_get("new_items")?,
            errors_count: row.try_get("errors_count")?,
            current_folder: row.try_get("current_folder")?,
            error: row.try_get("error")?,
            started_at: str_to_datetime(&started_str).map_err(decode_err)?,
            completed_at: str_to_datetime_opt(completed_str.as_deref()).map_err(decode_err)?,
        })
    }
}

/// Organize job record from database
#[derive(Debug, Clone, Serialize)]
pub struct OrganizeJobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub total_files: i64,
    pub processed_files: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub current_file: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for OrganizeJobRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        let id_str: String = row.try_get("id")?;
        let status_str: String = row.try_get("status")?;
        let started_str: String = row.try_get("started_at")?;
        let completed_str: Option<String> = row.try_get("completed_at")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(decode_err)?,
            status: JobStatus::from_str(&status_str),
            total_files: row.try_get("total_files")?,
            processed_files: row.try_get("processed_files")?,
            success_count: row.try_get("success_count")?,
            failed_count: row.try_get("failed_count")?,
            current_file: row.try_get("current_file")?,
            error: row.try_get("error")?,
            started_at: str_to_datetime(&started_str).map_err(decode_err)?,
            completed_at: str_to_datetime_opt(completed_str.as_deref()).map_err(decode_err)?,
        })
    }
}

pub struct JobRepository {
    pool: DbPool,
}

impl JobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a scan job already in the running state
    pub async fn create_scan_job(&self) -> Result<ScanJobRecord> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO scan_jobs (id, status, started_at) VALUES (?1, 'running', ?2)",
        )
        .bind(uuid_to_str(id))
        .bind(datetime_to_str(Utc::now()))
        .execute(&self.pool)
        .await?;

        self.get_scan_job(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to read scan job back after insert"))
    }

    pub async fn get_scan_job(&self, id: Uuid) -> Result<Option<ScanJobRecord>> {
        let record = sqlx::query_as::<_, ScanJobRecord>("SELECT * FROM scan_jobs WHERE id = ?1")
            .bind(uuid_to_str(id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    pub async fn set_scan_total(&self, id: Uuid, total_files: i64) -> Result<()> {
        sqlx::query("UPDATE scan_jobs SET total_files = ?2 WHERE id = ?1")
            .bind(uuid_to_str(id))
            .bind(total_files)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn update_scan_progress(
        &self,
        id: Uuid,
        processed_files: i64,
        new_items: i64,
        errors_count: i64,
        current_folder: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scan_jobs SET
                processed_files = ?2, new_items = ?3,
                errors_count = ?4, current_folder = ?5
            WHERE id = ?1
            "#,
        )
        .bind(uuid_to_str(id))
        .bind(processed_files)
        .bind(new_items)
        .bind(errors_count)
        .bind(current_folder)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Transition a scan job into a terminal state
    pub async fn finish_scan_job(
        &self,
        id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scan_jobs SET status = ?2, error = ?3, completed_at = ?4
            WHERE id = ?1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(uuid_to_str(id))
        .bind(status.as_str())
        .bind(error)
        .bind(datetime_to_str(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create an organize job already in the running state
    pub async fn create_organize_job(&self, total_files: i64) -> Result<OrganizeJobRecord> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO organize_jobs (id, status, total_files, started_at)
            VALUES (?1, 'running', ?2, ?3)
            "#,
        )
        .bind(uuid_to_str(id))
        .bind(total_files)
        .bind(datetime_to_str(Utc::now()))
        .execute(&self.pool)
        .await?;

        self.get_organize_job(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to read organize job back after insert"))
    }

    pub async fn get_organize_job(&self, id: Uuid) -> Result<Option<OrganizeJobRecord>> {
        let record =
            sqlx::query_as::<_, OrganizeJobRecord>("SELECT * FROM organize_jobs WHERE id = ?1")
                .bind(uuid_to_str(id))
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }

    pub async fn update_organize_progress(
        &self,
        id: Uuid,
        processed_files: i64,
        success_count: i64,
        failed_count: i64,
        current_file: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE organize_jobs SET
                processed_files = ?2, success_count = ?3,
                failed_count = ?4, current_file = ?5
            WHERE id = ?1
            "#,
        )
        .bind(uuid_to_str(id))
        .bind(processed_files)
        .bind(success_count)
        .bind(failed_count)
        .bind(current_file)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Transition an organize job into a terminal state
    pub async fn finish_organize_job(
        &self,
        id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE organize_jobs SET status = ?2, error = ?3, completed_at = ?4
            WHERE id = ?1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(uuid_to_str(id))
        .bind(status.as_str())
        .bind(error)
        .bind(datetime_to_str(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
