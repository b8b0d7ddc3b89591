//! Boolean candidate search

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::error::ApiResult;
use crate::models::{Actor, Candidate};
use crate::pagination::Page;
use crate::services::search::{self, SearchParams};
use crate::AppState;

/// GET /api/search/candidates?q=...&job_id=...&page=...
pub async fn search_candidates(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Page<Candidate>>> {
    Ok(Json(search::search_candidates(&state, &actor, params).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/search/candidates", get(search_candidates))
}
