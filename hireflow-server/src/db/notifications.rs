//! Notification rows

use super::{get_bool, get_opt_time, get_time, get_uuid};
use crate::models::Notification;
use chrono::{DateTime, Utc};
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, company_id, kind, title, body, link, is_read, created_at, read_at";

fn notification_from_row(row: &SqliteRow) -> Result<Notification> {
    Ok(Notification {
        id: get_uuid(row, "id")?,
        user_id: get_uuid(row, "user_id")?,
        company_id: get_uuid(row, "company_id")?,
        kind: row.try_get("kind")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        link: row.try_get("link")?,
        is_read: get_bool(row, "is_read")?,
        created_at: get_time(row, "created_at")?,
        read_at: get_opt_time(row, "read_at")?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, n: &Notification) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, company_id, kind, title, body, link, is_read,
                                   created_at, read_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, NULL)
        "#,
    )
    .bind(n.id.to_string())
    .bind(n.user_id.to_string())
    .bind(n.company_id.to_string())
    .bind(&n.kind)
    .bind(&n.title)
    .bind(&n.body)
    .bind(&n.link)
    .bind(time::to_db(&n.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn count(conn: &mut SqliteConnection, user_id: Uuid, unread_only: bool) -> Result<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND (? = 0 OR is_read = 0)",
    )
    .bind(user_id.to_string())
    .bind(unread_only as i64)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

pub async fn list(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Notification>> {
    let sql = format!(
        "SELECT {} FROM notifications WHERE user_id = ? AND (? = 0 OR is_read = 0) \
         ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        NOTIFICATION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(unread_only as i64)
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await?;
    rows.iter().map(notification_from_row).collect()
}

pub async fn get_for_user(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<Notification>> {
    let sql = format!(
        "SELECT {} FROM notifications WHERE id = ? AND user_id = ?",
        NOTIFICATION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(notification_from_row).transpose()
}

/// Mark one notification read; already-read rows keep their `read_at`
pub async fn mark_read(conn: &mut SqliteConnection, id: Uuid, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE notifications SET is_read = 1, read_at = ? WHERE id = ? AND is_read = 0")
        .bind(time::to_db(&at))
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Returns the number of notifications changed
pub async fn mark_all_read(conn: &mut SqliteConnection, user_id: Uuid, at: DateTime<Utc>) -> Result<u64> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = 1, read_at = ? WHERE user_id = ? AND is_read = 0")
            .bind(time::to_db(&at))
            .bind(user_id.to_string())
            .execute(conn)
            .await?;
    Ok(result.rows_affected())
}
