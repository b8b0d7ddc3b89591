//! Vendor job assignment rows

use super::{get_opt_uuid, get_time, get_uuid, opt_id};
use crate::models::VendorAssignment;
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

fn assignment_from_row(row: &SqliteRow) -> Result<VendorAssignment> {
    Ok(VendorAssignment {
        vendor_id: get_uuid(row, "vendor_id")?,
        job_id: get_uuid(row, "job_id")?,
        assigned_by: get_opt_uuid(row, "assigned_by")?,
        assigned_at: get_time(row, "assigned_at")?,
    })
}

/// Insert unless present; returns true when a row was created
pub async fn assign(conn: &mut SqliteConnection, assignment: &VendorAssignment) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO vendor_job_assignments (vendor_id, job_id, assigned_by, assigned_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(assignment.vendor_id.to_string())
    .bind(assignment.job_id.to_string())
    .bind(opt_id(assignment.assigned_by))
    .bind(time::to_db(&assignment.assigned_at))
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns true when a row was removed
pub async fn unassign(conn: &mut SqliteConnection, vendor_id: Uuid, job_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM vendor_job_assignments WHERE vendor_id = ? AND job_id = ?")
        .bind(vendor_id.to_string())
        .bind(job_id.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get(conn: &mut SqliteConnection, vendor_id: Uuid, job_id: Uuid) -> Result<Option<VendorAssignment>> {
    let row = sqlx::query(
        "SELECT vendor_id, job_id, assigned_by, assigned_at FROM vendor_job_assignments \
         WHERE vendor_id = ? AND job_id = ?",
    )
    .bind(vendor_id.to_string())
    .bind(job_id.to_string())
    .fetch_optional(conn)
    .await?;
    row.as_ref().map(assignment_from_row).transpose()
}

pub async fn is_assigned(conn: &mut SqliteConnection, vendor_id: Uuid, job_id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM vendor_job_assignments WHERE vendor_id = ? AND job_id = ?)",
    )
    .bind(vendor_id.to_string())
    .bind(job_id.to_string())
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

/// Assignment counts per vendor of a company (vendors without any included)
pub async fn vendor_assignment_counts(
    conn: &mut SqliteConnection,
    company_id: Uuid,
) -> Result<Vec<(Uuid, i64)>> {
    let rows = sqlx::query(
        "SELECT u.id AS id, COUNT(v.job_id) AS n FROM users u \
         LEFT JOIN vendor_job_assignments v ON v.vendor_id = u.id \
         WHERE u.company_id = ? AND u.role = 'vendor' GROUP BY u.id",
    )
    .bind(company_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter()
        .map(|r| Ok((get_uuid(r, "id")?, r.try_get("n")?)))
        .collect()
}
