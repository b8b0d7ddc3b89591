//! Pipeline stage rows

use super::{get_bool, get_opt_uuid, get_time, get_uuid, opt_id};
use crate::models::PipelineStage;
use hireflow_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const STAGE_COLUMNS: &str =
    "id, job_id, parent_id, name, position, is_default, is_mandatory, created_at";

fn stage_from_row(row: &SqliteRow) -> Result<PipelineStage> {
    Ok(PipelineStage {
        id: get_uuid(row, "id")?,
        job_id: get_uuid(row, "job_id")?,
        parent_id: get_opt_uuid(row, "parent_id")?,
        name: row.try_get("name")?,
        position: row.try_get("position")?,
        is_default: get_bool(row, "is_default")?,
        is_mandatory: get_bool(row, "is_mandatory")?,
        created_at: get_time(row, "created_at")?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, stage: &PipelineStage) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pipeline_stages (id, job_id, parent_id, name, position, is_default,
                                     is_mandatory, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(stage.id.to_string())
    .bind(stage.job_id.to_string())
    .bind(opt_id(stage.parent_id))
    .bind(&stage.name)
    .bind(stage.position)
    .bind(stage.is_default as i64)
    .bind(stage.is_mandatory as i64)
    .bind(time::to_db(&stage.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, job_id: Uuid, id: Uuid) -> Result<Option<PipelineStage>> {
    let sql = format!(
        "SELECT {} FROM pipeline_stages WHERE id = ? AND job_id = ?",
        STAGE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(job_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(stage_from_row).transpose()
}

/// Lookup by id only (the caller checks job ownership)
pub async fn get_any(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<PipelineStage>> {
    let sql = format!("SELECT {} FROM pipeline_stages WHERE id = ?", STAGE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(stage_from_row).transpose()
}

/// Every stage of a job, top-level groups first, each ordered by position
pub async fn list_for_job(conn: &mut SqliteConnection, job_id: Uuid) -> Result<Vec<PipelineStage>> {
    let sql = format!(
        "SELECT {} FROM pipeline_stages WHERE job_id = ? \
         ORDER BY parent_id IS NOT NULL, parent_id, position",
        STAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(job_id.to_string())
        .fetch_all(conn)
        .await?;
    rows.iter().map(stage_from_row).collect()
}

/// Siblings sharing `(job_id, parent_id)`, ordered by position
pub async fn list_siblings(
    conn: &mut SqliteConnection,
    job_id: Uuid,
    parent_id: Option<Uuid>,
) -> Result<Vec<PipelineStage>> {
    let sql = format!(
        "SELECT {} FROM pipeline_stages WHERE job_id = ? AND parent_id IS ? \
         ORDER BY position, created_at",
        STAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(job_id.to_string())
        .bind(opt_id(parent_id))
        .fetch_all(conn)
        .await?;
    rows.iter().map(stage_from_row).collect()
}

pub async fn get_default(conn: &mut SqliteConnection, job_id: Uuid) -> Result<Option<PipelineStage>> {
    let sql = format!(
        "SELECT {} FROM pipeline_stages WHERE job_id = ? AND parent_id IS NULL AND is_default = 1 \
         ORDER BY position LIMIT 1",
        STAGE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(job_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(stage_from_row).transpose()
}

pub async fn set_position(conn: &mut SqliteConnection, id: Uuid, position: i64) -> Result<()> {
    sqlx::query("UPDATE pipeline_stages SET position = ? WHERE id = ?")
        .bind(position)
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Shift siblings at or after `from_position` one place later
pub async fn shift_from(
    conn: &mut SqliteConnection,
    job_id: Uuid,
    parent_id: Option<Uuid>,
    from_position: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE pipeline_stages SET position = position + 1 \
         WHERE job_id = ? AND parent_id IS ? AND position >= ?",
    )
    .bind(job_id.to_string())
    .bind(opt_id(parent_id))
    .bind(from_position)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn rename(conn: &mut SqliteConnection, id: Uuid, name: &str) -> Result<()> {
    sqlx::query("UPDATE pipeline_stages SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Make `id` the job's only default stage
pub async fn set_default(conn: &mut SqliteConnection, job_id: Uuid, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE pipeline_stages SET is_default = (id = ?) WHERE job_id = ?")
        .bind(id.to_string())
        .bind(job_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn child_count(conn: &mut SqliteConnection, id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pipeline_stages WHERE parent_id = ?")
        .bind(id.to_string())
        .fetch_one(conn)
        .await?;
    Ok(count)
}

pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM pipeline_stages WHERE id = ?")
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Active application counts keyed by stage id for one job
pub async fn active_counts(conn: &mut SqliteConnection, job_id: Uuid) -> Result<Vec<(Uuid, i64)>> {
    let rows = sqlx::query(
        "SELECT current_stage_id, COUNT(*) AS n FROM job_candidates \
         WHERE job_id = ? AND status = 'active' GROUP BY current_stage_id",
    )
    .bind(job_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter()
        .map(|r| Ok((get_uuid(r, "current_stage_id")?, r.try_get("n")?)))
        .collect()
}
