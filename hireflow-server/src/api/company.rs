//! Company profile and user management

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use hireflow_common::auth::Role;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, Company, User};
use crate::services::users::{self, CompanyUpdate, NewUser, UserUpdate};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
}

pub async fn get_company(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Company>> {
    Ok(Json(users::get_company(&state, &actor).await?))
}

pub async fn update_company(
    State(state): State<AppState>,
    actor: Actor,
    Json(update): Json<CompanyUpdate>,
) -> ApiResult<Json<Company>> {
    Ok(Json(users::update_company(&state, &actor, update).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(users::list_users(&state, &actor, query.role).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    Json(new): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = users::create_user(&state, &actor, new).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<Json<User>> {
    Ok(Json(users::update_user(&state, &actor, id, update).await?))
}

/// DELETE /api/users/:id deactivates; users are never removed
pub async fn deactivate_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(users::deactivate_user(&state, &actor, id).await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/company", get(get_company).patch(update_company))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", patch(update_user).delete(deactivate_user))
}
