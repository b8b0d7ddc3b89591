//! Data access layer
//!
//! Every function takes `&mut SqliteConnection` so the same query runs on a
//! pooled connection or inside a transaction (`&mut *tx`). Queries never
//! reach for the pool themselves.

use chrono::{DateTime, Utc};
use hireflow_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

pub mod analytics;
pub mod applications;
pub mod calendar;
pub mod candidates;
pub mod companies;
pub mod interviews;
pub mod jobs;
pub mod notifications;
pub mod sla;
pub mod stages;
pub mod users;
pub mod vendors;

/// Read a TEXT column holding a UUID
pub(crate) fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let text: String = row.try_get(column)?;
    Uuid::parse_str(&text)
        .map_err(|e| Error::Internal(format!("column {} holds invalid uuid '{}': {}", column, text, e)))
}

pub(crate) fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let text: Option<String> = row.try_get(column)?;
    text.map(|t| {
        Uuid::parse_str(&t)
            .map_err(|e| Error::Internal(format!("column {} holds invalid uuid '{}': {}", column, t, e)))
    })
    .transpose()
}

pub(crate) fn get_time(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let text: String = row.try_get(column)?;
    time::from_db(&text)
}

pub(crate) fn get_opt_time(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.try_get(column)?;
    text.as_deref().map(time::from_db).transpose()
}

/// Read a TEXT column holding one of a closed set of values
pub(crate) fn get_enum<T: FromStr<Err = Error>>(row: &SqliteRow, column: &str) -> Result<T> {
    let text: String = row.try_get(column)?;
    text.parse()
}

pub(crate) fn get_bool(row: &SqliteRow, column: &str) -> Result<bool> {
    let value: i64 = row.try_get(column)?;
    Ok(value != 0)
}

/// True when the error is a UNIQUE / PRIMARY KEY constraint failure
pub fn is_unique_violation(err: &Error) -> bool {
    match err {
        Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Bind-ready optional UUID
pub(crate) fn opt_id(id: Option<Uuid>) -> Option<String> {
    id.map(|u| u.to_string())
}

/// Bind-ready optional timestamp
pub(crate) fn opt_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(time::to_db)
}
