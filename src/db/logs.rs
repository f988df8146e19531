//! Organization audit log database operations
//!
//! Append-only. Every move, collision skip, and per-item failure leaves a
//! row so operators can reconstruct what the executor did to the disk.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use super::sqlite_helpers::{
    datetime_to_str, decode_err, str_to_datetime, str_to_uuid, str_to_uuid_opt, uuid_to_str,
};
use super::DbPool;

/// What the executor did to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Move,
    Skip,
    Error,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Move => "move",
            LogAction::Skip => "skip",
            LogAction::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "move" => LogAction::Move,
            "skip" => LogAction::Skip,
            _ => LogAction::Error,
        }
    }
}

/// Audit log record from database
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationLogRecord {
    pub id: Uuid,
    pub media_item_id: Option<Uuid>,
    pub action: LogAction,
    pub source_path: Option<String>,
    pub destination_path: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for OrganizationLogRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        let id_str: String = row.try_get("id")?;
        let item_str: Option<String> = row.try_get("media_item_id")?;
        let action_str: String = row.try_get("action")?;
        let created_str: String = row.try_get("created_at")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(decode_err)?,
            media_item_id: str_to_uuid_opt(item_str.as_deref()).map_err(decode_err)?,
            action: LogAction::from_str(&action_str),
            source_path: row.try_get("source_path")?,
            destination_path: row.try_get("destination_path")?,
            error: row.try_get("error")?,
            created_at: str_to_datetime(&created_str).map_err(decode_err)?,
        })
    }
}

pub struct OrganizationLogRepository {
    pool: DbPool,
}

impl OrganizationLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an audit row
    pub async fn append(
        &self,
        media_item_id: Option<Uuid>,
        action: LogAction,
        source_path: Option<&str>,
        destination_path: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO organization_logs
                (id, media_item_id, action, source_path, destination_path, error, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(uuid_to_str(Uuid::new_v4()))
        .bind(media_item_id.map(uuid_to_str))
        .bind(action.as_str())
        .bind(source_path)
        .bind(destination_path)
        .bind(error)
        .bind(datetime_to_str(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent audit rows, newest first
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<OrganizationLogRecord>> {
        let records = sqlx::query_as::<_, OrganizationLogRecord>(
            "SELECT * FROM organization_logs ORDER BY created_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Audit rows for a single item, newest first
    pub async fn list_for_item(&self, media_item_id: Uuid) -> Result<Vec<OrganizationLogRecord>> {
        let records = sqlx::query_as::<_, OrganizationLogRecord>(
            r#"
            SELECT * FROM organization_logs
            WHERE media_item_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(uuid_to_str(media_item_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
