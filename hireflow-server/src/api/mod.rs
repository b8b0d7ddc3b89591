//! HTTP API
//!
//! Every route except `/health` requires a bearer token; see [`extract`].

pub mod analytics;
pub mod applications;
pub mod auth;
pub mod calendar;
pub mod candidates;
pub mod company;
pub mod extract;
pub mod health;
pub mod interviews;
pub mod jobs;
pub mod notifications;
pub mod search;
pub mod sla;
pub mod sse;
pub mod vendors;

use axum::Router;

use crate::AppState;

pub use health::health_routes;

/// All `/api` routes, before nesting
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(company::routes())
        .merge(jobs::routes())
        .merge(applications::routes())
        .merge(candidates::routes())
        .merge(interviews::routes())
        .merge(calendar::routes())
        .merge(vendors::routes())
        .merge(notifications::routes())
        .merge(sla::routes())
        .merge(search::routes())
        .merge(analytics::routes())
        .merge(sse::routes())
}
