//! In-app notifications
//!
//! Rows are written inside the caller's transaction with [`create`]; the
//! matching `NotificationCreated` events go out with [`publish`] once that
//! transaction has committed.

use crate::db;
use crate::models::{Actor, Notification};
use crate::pagination::{calculate_pagination, Page, PageParams};
use crate::AppState;
use hireflow_common::events::{AtsEvent, EventBus};
use hireflow_common::{time, Error, Result};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

/// Notification content shared by every recipient
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: &'static str,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

impl NotificationDraft {
    pub fn new(kind: &'static str, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Persist one notification per distinct recipient
pub async fn create(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    recipients: &[Uuid],
    draft: &NotificationDraft,
) -> Result<Vec<Notification>> {
    let mut seen = Vec::with_capacity(recipients.len());
    let mut created = Vec::with_capacity(recipients.len());
    let now = time::now();

    for &user_id in recipients {
        if seen.contains(&user_id) {
            continue;
        }
        seen.push(user_id);

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            company_id,
            kind: draft.kind.to_string(),
            title: draft.title.clone(),
            body: draft.body.clone(),
            link: draft.link.clone(),
            is_read: false,
            created_at: now,
            read_at: None,
        };
        db::notifications::insert(&mut *conn, &notification).await?;
        created.push(notification);
    }

    Ok(created)
}

/// Emit `NotificationCreated` for committed rows
pub fn publish(bus: &EventBus, notifications: &[Notification]) {
    for n in notifications {
        bus.emit(AtsEvent::NotificationCreated {
            company_id: n.company_id,
            user_id: n.user_id,
            notification_id: n.id,
            kind: n.kind.clone(),
            title: n.title.clone(),
            timestamp: n.created_at,
        });
    }
    if !notifications.is_empty() {
        debug!(count = notifications.len(), "Notifications published");
    }
}

/// Persist and publish outside any larger transaction
pub async fn notify(
    state: &AppState,
    company_id: Uuid,
    recipients: &[Uuid],
    draft: &NotificationDraft,
) -> Result<Vec<Notification>> {
    let mut tx = state.db.begin().await?;
    let created = create(&mut *tx, company_id, recipients, draft).await?;
    tx.commit().await?;
    publish(&state.event_bus, &created);
    Ok(created)
}

pub async fn list(
    state: &AppState,
    actor: &Actor,
    unread_only: bool,
    params: PageParams,
) -> Result<Page<Notification>> {
    let mut conn = state.db.acquire().await?;
    let total = db::notifications::count(&mut conn, actor.user_id, unread_only).await?;
    let pagination = calculate_pagination(total, params.page, params.page_size);
    let items = db::notifications::list(
        &mut conn,
        actor.user_id,
        unread_only,
        pagination.page_size,
        pagination.offset,
    )
    .await?;
    Ok(Page::new(items, pagination, total))
}

pub async fn unread_count(state: &AppState, actor: &Actor) -> Result<i64> {
    let mut conn = state.db.acquire().await?;
    db::notifications::count(&mut conn, actor.user_id, true).await
}

/// Mark one of the caller's notifications read
///
/// Marking an already-read notification is a no-op; another user's
/// notification is NotFound.
pub async fn mark_read(state: &AppState, actor: &Actor, id: Uuid) -> Result<Notification> {
    let mut conn = state.db.acquire().await?;
    let mut notification = db::notifications::get_for_user(&mut conn, actor.user_id, id)
        .await?
        .ok_or_else(|| Error::not_found("notification", id))?;

    if !notification.is_read {
        let now = time::now();
        db::notifications::mark_read(&mut conn, id, now).await?;
        notification.is_read = true;
        notification.read_at = Some(now);
    }

    Ok(notification)
}

/// Returns how many notifications changed
pub async fn mark_all_read(state: &AppState, actor: &Actor) -> Result<u64> {
    let mut conn = state.db.acquire().await?;
    db::notifications::mark_all_read(&mut conn, actor.user_id, time::now()).await
}
