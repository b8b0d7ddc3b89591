//! Vendor (agency) users and their job assignments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, JobSummary, VendorAssignment};
use crate::pagination::{Page, PageParams};
use crate::services::vendors::{self, VendorSummary};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub job_id: Uuid,
}

pub async fn list_vendors(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<VendorSummary>>> {
    Ok(Json(vendors::list_vendors(&state, &actor).await?))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    actor: Actor,
    Path(vendor_id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<JobSummary>>> {
    Ok(Json(vendors::list_vendor_jobs(&state, &actor, vendor_id, page).await?))
}

pub async fn assign(
    State(state): State<AppState>,
    actor: Actor,
    Path(vendor_id): Path<Uuid>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<(StatusCode, Json<VendorAssignment>)> {
    let assignment = vendors::assign(&state, &actor, vendor_id, req.job_id).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn unassign(
    State(state): State<AppState>,
    actor: Actor,
    Path((vendor_id, job_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    vendors::unassign(&state, &actor, vendor_id, job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vendors", get(list_vendors))
        .route("/vendors/:id/jobs", get(list_jobs).post(assign))
        .route("/vendors/:id/jobs/:job_id", delete(unassign))
}
