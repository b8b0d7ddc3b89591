//! Calendar connection and OAuth state rows

use super::{get_enum, get_opt_time, get_time, get_uuid, opt_ts};
use crate::models::{CalendarConnection, CalendarProviderKind};
use chrono::{DateTime, Utc};
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const CONNECTION_COLUMNS: &str = "user_id, provider, access_token, refresh_token, expires_at, \
     external_email, created_at, updated_at";

fn connection_from_row(row: &SqliteRow) -> Result<CalendarConnection> {
    Ok(CalendarConnection {
        user_id: get_uuid(row, "user_id")?,
        provider: get_enum(row, "provider")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at: get_opt_time(row, "expires_at")?,
        external_email: row.try_get("external_email")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

/// Insert or replace a user's connection for one provider
///
/// A refresh that returns no new refresh token keeps the stored one.
pub async fn upsert_connection(conn: &mut SqliteConnection, c: &CalendarConnection) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO calendar_connections (user_id, provider, access_token, refresh_token,
                                          expires_at, external_email, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, provider) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = COALESCE(excluded.refresh_token, calendar_connections.refresh_token),
            expires_at = excluded.expires_at,
            external_email = COALESCE(excluded.external_email, calendar_connections.external_email),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(c.user_id.to_string())
    .bind(c.provider.as_str())
    .bind(&c.access_token)
    .bind(&c.refresh_token)
    .bind(opt_ts(c.expires_at))
    .bind(&c.external_email)
    .bind(time::to_db(&c.created_at))
    .bind(time::to_db(&c.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_connection(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    provider: CalendarProviderKind,
) -> Result<Option<CalendarConnection>> {
    let sql = format!(
        "SELECT {} FROM calendar_connections WHERE user_id = ? AND provider = ?",
        CONNECTION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(provider.as_str())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(connection_from_row).transpose()
}

pub async fn list_connections(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Vec<CalendarConnection>> {
    let sql = format!(
        "SELECT {} FROM calendar_connections WHERE user_id = ? ORDER BY provider",
        CONNECTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id.to_string())
        .fetch_all(conn)
        .await?;
    rows.iter().map(connection_from_row).collect()
}

/// Returns true when a row was removed
pub async fn delete_connection(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    provider: CalendarProviderKind,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM calendar_connections WHERE user_id = ? AND provider = ?")
        .bind(user_id.to_string())
        .bind(provider.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_state(
    conn: &mut SqliteConnection,
    state: &str,
    user_id: Uuid,
    provider: CalendarProviderKind,
    created_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO calendar_oauth_states (state, user_id, provider, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(state)
    .bind(user_id.to_string())
    .bind(provider.as_str())
    .bind(time::to_db(&created_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Stored OAuth state
#[derive(Debug, Clone)]
pub struct OAuthState {
    pub user_id: Uuid,
    pub provider: CalendarProviderKind,
    pub created_at: DateTime<Utc>,
}

/// Delete and return a state (single use)
pub async fn take_state(conn: &mut SqliteConnection, state: &str) -> Result<Option<OAuthState>> {
    let row = sqlx::query(
        "SELECT user_id, provider, created_at FROM calendar_oauth_states WHERE state = ?",
    )
    .bind(state)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM calendar_oauth_states WHERE state = ?")
        .bind(state)
        .execute(conn)
        .await?;

    Ok(Some(OAuthState {
        user_id: get_uuid(&row, "user_id")?,
        provider: get_enum(&row, "provider")?,
        created_at: get_time(&row, "created_at")?,
    }))
}

/// Drop states created before `cutoff`
pub async fn purge_states_before(conn: &mut SqliteConnection, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM calendar_oauth_states WHERE created_at < ?")
        .bind(time::to_db(&cutoff))
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
