//! SQLite helper utilities for type conversion
//!
//! SQLite doesn't natively support UUIDs or timezone-aware timestamps.
//! This module provides conversions between Rust types and the TEXT
//! representations the schema uses.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Convert a UUID to a SQLite-compatible string
#[inline]
pub fn uuid_to_str(id: Uuid) -> String {
    id.to_string()
}

/// Parse a SQLite string back to a UUID
#[inline]
pub fn str_to_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| anyhow!("Invalid UUID '{}': {}", s, e))
}

/// Parse an optional SQLite string to an optional UUID
#[inline]
pub fn str_to_uuid_opt(s: Option<&str>) -> Result<Option<Uuid>> {
    match s {
        Some(s) => Ok(Some(str_to_uuid(s)?)),
        None => Ok(None),
    }
}

/// Serialize a timestamp to the RFC3339 TEXT form stored in the database
#[inline]
pub fn datetime_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Parse an RFC3339 TEXT column back to a timestamp
#[inline]
pub fn str_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Invalid timestamp '{}': {}", s, e))
}

/// Parse an optional RFC3339 TEXT column
#[inline]
pub fn str_to_datetime_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match s {
        Some(s) => Ok(Some(str_to_datetime(s)?)),
        None => Ok(None),
    }
}

/// Decode error helper for FromRow implementations
#[inline]
pub fn decode_err(e: anyhow::Error) -> sqlx::Error {
    sqlx::Error::Decode(e.into())
}
