//! Vendor job assignments

use super::notifications::{self, NotificationDraft};
use crate::db;
use crate::db::jobs::JobFilter;
use crate::models::{Actor, JobSummary, User, VendorAssignment};
use crate::pagination::{calculate_pagination, Page, PageParams};
use crate::AppState;
use hireflow_common::auth::{Permission, Role};
use hireflow_common::{time, Error, Result};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct VendorSummary {
    #[serde(flatten)]
    pub user: User,
    pub assigned_jobs: i64,
}

/// Whether a user may work with a job
///
/// Non-vendors see every job of their company; vendors need an assignment.
pub async fn can_access_job(conn: &mut SqliteConnection, actor: &Actor, job_id: Uuid) -> Result<bool> {
    if db::jobs::get(&mut *conn, actor.company_id, job_id).await?.is_none() {
        return Ok(false);
    }
    if actor.is_vendor() {
        return db::vendors::is_assigned(conn, actor.user_id, job_id).await;
    }
    Ok(true)
}

async fn load_vendor(conn: &mut SqliteConnection, company_id: Uuid, vendor_id: Uuid) -> Result<User> {
    let user = db::users::get(conn, company_id, vendor_id)
        .await?
        .ok_or_else(|| Error::not_found("user", vendor_id))?;
    if user.role != Role::Vendor {
        return Err(Error::InvalidInput(format!("user {} is not a vendor", vendor_id)));
    }
    Ok(user)
}

pub async fn list_vendors(state: &AppState, actor: &Actor) -> Result<Vec<VendorSummary>> {
    actor.require(Permission::ManageVendors)?;

    let mut conn = state.db.acquire().await?;
    let users = db::users::list(&mut conn, actor.company_id, Some(Role::Vendor)).await?;
    let counts = db::vendors::vendor_assignment_counts(&mut conn, actor.company_id).await?;

    Ok(users
        .into_iter()
        .map(|user| {
            let assigned_jobs = counts
                .iter()
                .find(|(id, _)| *id == user.id)
                .map(|(_, n)| *n)
                .unwrap_or(0);
            VendorSummary { user, assigned_jobs }
        })
        .collect())
}

/// Jobs assigned to a vendor
///
/// Vendors may list their own assignments; managers may list anyone's.
pub async fn list_vendor_jobs(
    state: &AppState,
    actor: &Actor,
    vendor_id: Uuid,
    params: PageParams,
) -> Result<Page<JobSummary>> {
    if actor.user_id != vendor_id {
        actor.require(Permission::ManageVendors)?;
    }

    let mut conn = state.db.acquire().await?;
    load_vendor(&mut conn, actor.company_id, vendor_id).await?;

    let filter = JobFilter {
        status: None,
        vendor_id: Some(vendor_id),
    };
    let total = db::jobs::count(&mut conn, actor.company_id, &filter).await?;
    let pagination = calculate_pagination(total, params.page, params.page_size);
    let items = db::jobs::list(
        &mut conn,
        actor.company_id,
        &filter,
        pagination.page_size,
        pagination.offset,
    )
    .await?;
    Ok(Page::new(items, pagination, total))
}

/// Assign a job to a vendor; assigning twice returns the existing row
pub async fn assign(state: &AppState, actor: &Actor, vendor_id: Uuid, job_id: Uuid) -> Result<VendorAssignment> {
    actor.require(Permission::ManageVendors)?;

    let mut tx = state.db.begin().await?;
    load_vendor(&mut *tx, actor.company_id, vendor_id).await?;
    let job = db::jobs::get(&mut *tx, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;

    let created = db::vendors::assign(
        &mut *tx,
        &VendorAssignment {
            vendor_id,
            job_id,
            assigned_by: Some(actor.user_id),
            assigned_at: time::now(),
        },
    )
    .await?;

    let mut created_notes = Vec::new();
    if created {
        let draft = NotificationDraft::new(
            "vendor_assigned",
            format!("You were assigned to {}", job.title),
            "You can now submit candidates for this job.",
        )
        .with_link(format!("/jobs/{}", job.id));
        created_notes = notifications::create(&mut *tx, actor.company_id, &[vendor_id], &draft).await?;
    }

    let assignment = db::vendors::get(&mut *tx, vendor_id, job_id)
        .await?
        .ok_or_else(|| Error::Internal("vendor assignment missing after insert".to_string()))?;
    tx.commit().await?;

    notifications::publish(&state.event_bus, &created_notes);
    if created {
        info!(vendor_id = %vendor_id, job_id = %job_id, "Vendor assigned");
    }
    Ok(assignment)
}

pub async fn unassign(state: &AppState, actor: &Actor, vendor_id: Uuid, job_id: Uuid) -> Result<()> {
    actor.require(Permission::ManageVendors)?;

    let mut conn = state.db.acquire().await?;
    load_vendor(&mut conn, actor.company_id, vendor_id).await?;
    if !db::vendors::unassign(&mut conn, vendor_id, job_id).await? {
        return Err(Error::NotFound(format!(
            "vendor {} is not assigned to job {}",
            vendor_id, job_id
        )));
    }

    info!(vendor_id = %vendor_id, job_id = %job_id, "Vendor unassigned");
    Ok(())
}
