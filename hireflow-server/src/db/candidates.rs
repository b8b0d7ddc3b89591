//! Candidate rows

use super::{get_opt_uuid, get_time, get_uuid, opt_id};
use crate::models::Candidate;
use hireflow_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

pub(crate) const CANDIDATE_COLUMNS: &str = "c.id AS id, c.company_id AS company_id, \
     c.first_name AS first_name, c.last_name AS last_name, c.email AS email, c.phone AS phone, \
     c.location AS location, c.current_title AS current_title, \
     c.current_company AS current_company, c.skills AS skills, c.source AS source, \
     c.linkedin_url AS linkedin_url, c.summary AS summary, c.resume_url AS resume_url, \
     c.resume_file_name AS resume_file_name, c.resume_text AS resume_text, \
     c.created_by AS created_by, c.created_at AS created_at, c.updated_at AS updated_at";

pub(crate) fn candidate_from_row(row: &SqliteRow) -> Result<Candidate> {
    let skills_json: String = row.try_get("skills")?;
    let skills: Vec<String> = serde_json::from_str(&skills_json)
        .map_err(|e| Error::Internal(format!("candidate skills are not a JSON array: {}", e)))?;

    Ok(Candidate {
        id: get_uuid(row, "id")?,
        company_id: get_uuid(row, "company_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        location: row.try_get("location")?,
        current_title: row.try_get("current_title")?,
        current_company: row.try_get("current_company")?,
        skills,
        source: row.try_get("source")?,
        linkedin_url: row.try_get("linkedin_url")?,
        summary: row.try_get("summary")?,
        resume_url: row.try_get("resume_url")?,
        resume_file_name: row.try_get("resume_file_name")?,
        resume_text: row.try_get("resume_text")?,
        created_by: get_opt_uuid(row, "created_by")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn skills_json(skills: &[String]) -> String {
    serde_json::to_string(skills).unwrap_or_else(|_| "[]".to_string())
}

pub async fn insert(conn: &mut SqliteConnection, c: &Candidate) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO candidates (id, company_id, first_name, last_name, email, phone, location,
                                current_title, current_company, skills, source, linkedin_url,
                                summary, resume_url, resume_file_name, resume_text, created_by,
                                created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(c.id.to_string())
    .bind(c.company_id.to_string())
    .bind(&c.first_name)
    .bind(&c.last_name)
    .bind(&c.email)
    .bind(&c.phone)
    .bind(&c.location)
    .bind(&c.current_title)
    .bind(&c.current_company)
    .bind(skills_json(&c.skills))
    .bind(&c.source)
    .bind(&c.linkedin_url)
    .bind(&c.summary)
    .bind(&c.resume_url)
    .bind(&c.resume_file_name)
    .bind(&c.resume_text)
    .bind(opt_id(c.created_by))
    .bind(time::to_db(&c.created_at))
    .bind(time::to_db(&c.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Full-row update of the mutable candidate fields
pub async fn update(conn: &mut SqliteConnection, c: &Candidate) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE candidates SET first_name = ?, last_name = ?, email = ?, phone = ?, location = ?,
               current_title = ?, current_company = ?, skills = ?, source = ?, linkedin_url = ?,
               summary = ?, resume_url = ?, resume_file_name = ?, resume_text = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&c.first_name)
    .bind(&c.last_name)
    .bind(&c.email)
    .bind(&c.phone)
    .bind(&c.location)
    .bind(&c.current_title)
    .bind(&c.current_company)
    .bind(skills_json(&c.skills))
    .bind(&c.source)
    .bind(&c.linkedin_url)
    .bind(&c.summary)
    .bind(&c.resume_url)
    .bind(&c.resume_file_name)
    .bind(&c.resume_text)
    .bind(time::to_db(&c.updated_at))
    .bind(c.id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, company_id: Uuid, id: Uuid) -> Result<Option<Candidate>> {
    let sql = format!(
        "SELECT {} FROM candidates c WHERE c.id = ? AND c.company_id = ?",
        CANDIDATE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(company_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(candidate_from_row).transpose()
}

/// Lookup by normalized (lowercase) email within a company
pub async fn find_by_email(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    email: &str,
) -> Result<Option<Candidate>> {
    let sql = format!(
        "SELECT {} FROM candidates c WHERE c.company_id = ? AND c.email = ?",
        CANDIDATE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(company_id.to_string())
        .bind(email)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(candidate_from_row).transpose()
}

/// Listing filters
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub source: Option<String>,
    /// Only candidates with an application submitted by this vendor
    pub submitted_by_vendor: Option<Uuid>,
}

const FILTER_CLAUSE: &str = "c.company_id = ? AND (? IS NULL OR lower(c.source) = lower(?)) \
     AND (? IS NULL OR EXISTS (SELECT 1 FROM job_candidates jc \
                               WHERE jc.candidate_id = c.id AND jc.submitted_by_vendor_id = ?))";

pub async fn count(conn: &mut SqliteConnection, company_id: Uuid, filter: &CandidateFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM candidates c WHERE {}", FILTER_CLAUSE);
    let vendor = opt_id(filter.submitted_by_vendor);
    let total: i64 = sqlx::query_scalar(&sql)
        .bind(company_id.to_string())
        .bind(&filter.source)
        .bind(&filter.source)
        .bind(&vendor)
        .bind(&vendor)
        .fetch_one(conn)
        .await?;
    Ok(total)
}

pub async fn list(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    filter: &CandidateFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Candidate>> {
    let sql = format!(
        "SELECT {} FROM candidates c WHERE {} ORDER BY c.created_at DESC, c.id LIMIT ? OFFSET ?",
        CANDIDATE_COLUMNS, FILTER_CLAUSE
    );
    let vendor = opt_id(filter.submitted_by_vendor);
    let rows = sqlx::query(&sql)
        .bind(company_id.to_string())
        .bind(&filter.source)
        .bind(&filter.source)
        .bind(&vendor)
        .bind(&vendor)
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await?;
    rows.iter().map(candidate_from_row).collect()
}

pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM candidates WHERE id = ?")
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
