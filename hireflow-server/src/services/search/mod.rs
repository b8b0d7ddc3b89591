//! Boolean candidate search

pub mod query;

use crate::db::candidates::{candidate_from_row, CANDIDATE_COLUMNS};
use crate::models::{Actor, Candidate};
use crate::pagination::{calculate_pagination, Page, DEFAULT_PAGE_SIZE};
use crate::AppState;
use hireflow_common::auth::Permission;
use hireflow_common::Result;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

pub use query::{parse, to_sql, ParseError, Query, SqlPredicate};

/// `GET /api/search/candidates` parameters
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub job_id: Option<Uuid>,
    #[serde(default = "first_page")]
    pub page: i64,
}

fn first_page() -> i64 {
    1
}

/// Candidates matching a Boolean query, newest first
pub async fn search_candidates(state: &AppState, actor: &Actor, params: SearchParams) -> Result<Page<Candidate>> {
    actor.require(Permission::SearchCandidates)?;

    let parsed = parse(&params.q)?;
    let predicate = to_sql(&parsed);

    let job_clause = if params.job_id.is_some() {
        " AND EXISTS (SELECT 1 FROM job_candidates jc WHERE jc.candidate_id = c.id AND jc.job_id = ?)"
    } else {
        ""
    };
    let where_clause = format!("c.company_id = ? AND {}{}", predicate.sql, job_clause);

    let mut conn = state.db.acquire().await?;

    let count_sql = format!("SELECT COUNT(*) FROM candidates c WHERE {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(actor.company_id.to_string());
    for param in &predicate.params {
        count_query = count_query.bind(param);
    }
    if let Some(job_id) = params.job_id {
        count_query = count_query.bind(job_id.to_string());
    }
    let total = count_query.fetch_one(&mut *conn).await?;

    let pagination = calculate_pagination(total, params.page, DEFAULT_PAGE_SIZE);

    let list_sql = format!(
        "SELECT {} FROM candidates c WHERE {} ORDER BY c.created_at DESC, c.id LIMIT ? OFFSET ?",
        CANDIDATE_COLUMNS, where_clause
    );
    let mut list_query = sqlx::query(&list_sql).bind(actor.company_id.to_string());
    for param in &predicate.params {
        list_query = list_query.bind(param);
    }
    if let Some(job_id) = params.job_id {
        list_query = list_query.bind(job_id.to_string());
    }
    let rows = list_query
        .bind(pagination.page_size)
        .bind(pagination.offset)
        .fetch_all(&mut *conn)
        .await?;
    let items = rows.iter().map(candidate_from_row).collect::<Result<Vec<_>>>()?;

    debug!(query = %params.q, total, "Candidate search");
    Ok(Page::new(items, pagination, total))
}
