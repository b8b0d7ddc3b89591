//! In-app notifications for the current user

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, Notification};
use crate::pagination::{Page, PageParams};
use crate::services::notifications;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<NotificationQuery>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<Notification>>> {
    Ok(Json(notifications::list(&state, &actor, query.unread_only, page).await?))
}

pub async fn unread_count(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<UnreadCount>> {
    let unread = notifications::unread_count(&state, &actor).await?;
    Ok(Json(UnreadCount { unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(notifications::mark_read(&state, &actor, id).await?))
}

pub async fn mark_all_read(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<MarkedRead>> {
    let updated = notifications::mark_all_read(&state, &actor).await?;
    Ok(Json(MarkedRead { updated }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
}
