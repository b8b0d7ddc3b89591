//! User rows

use super::{get_bool, get_enum, get_opt_time, get_time, get_uuid};
use crate::models::User;
use chrono::{DateTime, Utc};
use hireflow_common::auth::Role;
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, company_id, email, full_name, role, is_active, created_at, last_login_at";

/// A user together with stored password material
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
    pub password_salt: String,
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: get_uuid(row, "id")?,
        company_id: get_uuid(row, "company_id")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        role: get_enum(row, "role")?,
        is_active: get_bool(row, "is_active")?,
        created_at: get_time(row, "created_at")?,
        last_login_at: get_opt_time(row, "last_login_at")?,
    })
}

pub async fn insert(
    conn: &mut SqliteConnection,
    user: &User,
    password_hash: &str,
    password_salt: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, company_id, email, full_name, role, password_hash,
                           password_salt, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(user.company_id.to_string())
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(user.role.as_str())
    .bind(password_hash)
    .bind(password_salt)
    .bind(user.is_active as i64)
    .bind(time::to_db(&user.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Lookup by id regardless of company (token verification)
pub async fn get_any(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn get(conn: &mut SqliteConnection, company_id: Uuid, id: Uuid) -> Result<Option<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE id = ? AND company_id = ?",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(company_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn get_credentials_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<UserCredentials>> {
    let sql = format!(
        "SELECT {}, password_hash, password_salt FROM users WHERE email = ?",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(conn)
        .await?;

    match row {
        Some(row) => Ok(Some(UserCredentials {
            user: user_from_row(&row)?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
        })),
        None => Ok(None),
    }
}

pub async fn email_exists(conn: &mut SqliteConnection, email: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
        .bind(email)
        .fetch_one(conn)
        .await?;
    Ok(exists)
}

pub async fn list(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    role: Option<Role>,
) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE company_id = ? AND (? IS NULL OR role = ?) ORDER BY full_name, email",
        USER_COLUMNS
    );
    let role = role.map(|r| r.as_str());
    let rows = sqlx::query(&sql)
        .bind(company_id.to_string())
        .bind(role)
        .bind(role)
        .fetch_all(conn)
        .await?;
    rows.iter().map(user_from_row).collect()
}

pub async fn update(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query("UPDATE users SET full_name = ?, role = ?, is_active = ? WHERE id = ?")
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.is_active as i64)
        .bind(user.id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn record_login(conn: &mut SqliteConnection, id: Uuid, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(time::to_db(&at))
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn count_active_admins(conn: &mut SqliteConnection, company_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE company_id = ? AND role = 'admin' AND is_active = 1",
    )
    .bind(company_id.to_string())
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Active admins of a company (fallback notification recipients)
pub async fn active_admin_ids(conn: &mut SqliteConnection, company_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT id FROM users WHERE company_id = ? AND role = 'admin' AND is_active = 1",
    )
    .bind(company_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter().map(|r| get_uuid(r, "id")).collect()
}
