//! Reporting endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::Actor;
use crate::services::analytics::{self, Funnel, Overview, SourceStats, TimeToHire};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TimeToHireQuery {
    pub job_id: Option<Uuid>,
}

pub async fn overview(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Overview>> {
    Ok(Json(analytics::overview(&state, &actor).await?))
}

pub async fn sources(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<SourceStats>>> {
    Ok(Json(analytics::sources(&state, &actor).await?))
}

pub async fn time_to_hire(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<TimeToHireQuery>,
) -> ApiResult<Json<TimeToHire>> {
    Ok(Json(analytics::time_to_hire(&state, &actor, query.job_id).await?))
}

pub async fn job_funnel(
    State(state): State<AppState>,
    actor: Actor,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Funnel>> {
    Ok(Json(analytics::job_funnel(&state, &actor, job_id).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/overview", get(overview))
        .route("/analytics/sources", get(sources))
        .route("/analytics/time-to-hire", get(time_to_hire))
        .route("/analytics/jobs/:id/funnel", get(job_funnel))
}
