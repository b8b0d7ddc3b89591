//! Company rows

use super::{get_time, get_uuid};
use crate::models::Company;
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

fn company_from_row(row: &SqliteRow) -> Result<Company> {
    Ok(Company {
        id: get_uuid(row, "id")?,
        name: row.try_get("name")?,
        domain: row.try_get("domain")?,
        created_at: get_time(row, "created_at")?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, company: &Company) -> Result<()> {
    sqlx::query("INSERT INTO companies (id, name, domain, created_at) VALUES (?, ?, ?, ?)")
        .bind(company.id.to_string())
        .bind(&company.name)
        .bind(&company.domain)
        .bind(time::to_db(&company.created_at))
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Company>> {
    let row = sqlx::query("SELECT id, name, domain, created_at FROM companies WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(company_from_row).transpose()
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: Uuid,
    name: &str,
    domain: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE companies SET name = ?, domain = ? WHERE id = ?")
        .bind(name)
        .bind(domain)
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Every company id (used by the SLA sweeper)
pub async fn list_ids(conn: &mut SqliteConnection) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("SELECT id FROM companies ORDER BY created_at")
        .fetch_all(conn)
        .await?;
    rows.iter().map(|r| get_uuid(r, "id")).collect()
}
