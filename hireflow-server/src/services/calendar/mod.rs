//! External calendar integration
//!
//! Users connect Google or Microsoft calendars through OAuth. Interviews are
//! pushed to connected panel members' calendars and provider busy times
//! feed the availability search. Provider failures never fail the
//! interview workflow itself.

pub mod availability;
pub mod google;
pub mod microsoft;
pub mod provider;

pub use availability::{TimeWindow, WorkingHours};
pub use provider::{CalendarEvent, CalendarProvider, TokenGrant};

use crate::db;
use crate::models::{Actor, CalendarConnection, CalendarProviderKind, Interview};
use crate::AppState;
use chrono::{DateTime, Duration, Utc};
use hireflow_common::auth::Role;
use hireflow_common::config::CalendarConfig;
use hireflow_common::{time, Error, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long an OAuth `state` stays valid
pub const STATE_TTL_MINUTES: i64 = 10;

/// Access tokens this close to expiry are refreshed before use
pub const REFRESH_MARGIN_SECS: i64 = 60;

pub const MAX_RANGE_DAYS: i64 = 31;
pub const MIN_SLOT_MINUTES: i64 = 15;
pub const MAX_SLOT_MINUTES: i64 = 480;

/// Configured providers and bookable hours
#[derive(Clone)]
pub struct CalendarRegistry {
    providers: HashMap<CalendarProviderKind, Arc<dyn CalendarProvider>>,
    pub working_hours: WorkingHours,
}

impl CalendarRegistry {
    pub fn new(working_hours: WorkingHours) -> Self {
        Self {
            providers: HashMap::new(),
            working_hours,
        }
    }

    /// Register every provider with client credentials and a redirect URL
    pub fn from_config(config: &CalendarConfig) -> Self {
        let mut registry = Self::new(WorkingHours {
            start: config.working_hours_start,
            end: config.working_hours_end,
        });

        let Some(redirect_url) = config.redirect_url.clone() else {
            if config.google.is_some() || config.microsoft.is_some() {
                warn!("calendar.redirect_url is not set; calendar providers disabled");
            }
            return registry;
        };

        let http = reqwest::Client::new();
        if let Some(client) = config.google.clone() {
            registry = registry.with_provider(Arc::new(google::GoogleCalendar::new(
                http.clone(),
                client,
                redirect_url.clone(),
            )));
        }
        if let Some(client) = config.microsoft.clone() {
            registry = registry.with_provider(Arc::new(microsoft::MicrosoftCalendar::new(
                http,
                client,
                redirect_url,
            )));
        }

        info!(providers = registry.providers.len(), "Calendar providers configured");
        registry
    }

    pub fn with_provider(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: CalendarProviderKind) -> Result<Arc<dyn CalendarProvider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::InvalidInput(format!("calendar provider {} not configured", kind)))
    }

    pub fn is_configured(&self, kind: CalendarProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }
}

#[derive(Debug, Serialize)]
pub struct ConnectStart {
    pub provider: CalendarProviderKind,
    pub authorize_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub state: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Comma-separated user ids
    pub user_ids: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub duration_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub user_ids: Vec<Uuid>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub duration_minutes: i64,
    pub busy: Vec<TimeWindow>,
    pub free: Vec<TimeWindow>,
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect()
}

/// Start an OAuth connection for the caller
pub async fn begin_connect(state: &AppState, actor: &Actor, kind: CalendarProviderKind) -> Result<ConnectStart> {
    actor.role.require_min(Role::Recruiter)?;
    let provider = state.calendar.get(kind)?;

    let token = random_state();
    let now = time::now();
    let mut conn = state.db.acquire().await?;
    db::calendar::purge_states_before(&mut conn, now - Duration::minutes(STATE_TTL_MINUTES)).await?;
    db::calendar::insert_state(&mut conn, &token, actor.user_id, kind, now).await?;

    Ok(ConnectStart {
        provider: kind,
        authorize_url: provider.authorize_url(&token)?,
        state: token,
    })
}

/// Consume the OAuth `state`, exchange the code and store the tokens
pub async fn complete_connect(state: &AppState, actor: &Actor, req: CallbackRequest) -> Result<CalendarConnection> {
    let now = time::now();

    let pending = {
        let mut conn = state.db.acquire().await?;
        db::calendar::take_state(&mut conn, &req.state).await?
    }
    .ok_or_else(|| Error::InvalidInput("unknown or already used OAuth state".to_string()))?;

    if pending.created_at < now - Duration::minutes(STATE_TTL_MINUTES) {
        return Err(Error::InvalidInput("OAuth state has expired".to_string()));
    }
    if pending.user_id != actor.user_id {
        return Err(Error::InvalidInput("OAuth state belongs to another user".to_string()));
    }
    if req.code.trim().is_empty() {
        return Err(Error::InvalidInput("code is required".to_string()));
    }

    let provider = state.calendar.get(pending.provider)?;
    let grant = provider.exchange_code(req.code.trim()).await?;

    let connection = CalendarConnection {
        user_id: actor.user_id,
        provider: pending.provider,
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_at: grant.expires_at,
        external_email: grant.external_email,
        created_at: now,
        updated_at: now,
    };
    let mut conn = state.db.acquire().await?;
    db::calendar::upsert_connection(&mut conn, &connection).await?;
    let stored = db::calendar::get_connection(&mut conn, actor.user_id, pending.provider)
        .await?
        .ok_or_else(|| Error::Internal("calendar connection vanished after save".to_string()))?;

    info!(user_id = %actor.user_id, provider = %pending.provider, "Calendar connected");
    Ok(stored)
}

pub async fn list_connections(state: &AppState, actor: &Actor) -> Result<Vec<CalendarConnection>> {
    let mut conn = state.db.acquire().await?;
    db::calendar::list_connections(&mut conn, actor.user_id).await
}

pub async fn disconnect(state: &AppState, actor: &Actor, kind: CalendarProviderKind) -> Result<()> {
    let mut conn = state.db.acquire().await?;
    if !db::calendar::delete_connection(&mut conn, actor.user_id, kind).await? {
        return Err(Error::NotFound(format!("no {} calendar connection", kind)));
    }
    info!(user_id = %actor.user_id, provider = %kind, "Calendar disconnected");
    Ok(())
}

/// Whether a token expiring at `expires_at` must be refreshed at `now`
pub(crate) fn needs_refresh(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|exp| exp - now <= Duration::seconds(REFRESH_MARGIN_SECS))
}

/// A usable access token for a connection, refreshing it when near expiry
async fn access_token(state: &AppState, connection: &CalendarConnection) -> Result<String> {
    let now = time::now();
    if !needs_refresh(connection.expires_at, now) {
        return Ok(connection.access_token.clone());
    }

    let refresh_token = connection.refresh_token.as_deref().ok_or_else(|| {
        Error::External(format!(
            "{} access token expired and no refresh token is stored",
            connection.provider
        ))
    })?;

    let provider = state.calendar.get(connection.provider)?;
    let grant = provider.refresh(refresh_token).await?;

    let refreshed = CalendarConnection {
        access_token: grant.access_token.clone(),
        refresh_token: grant.refresh_token,
        expires_at: grant.expires_at,
        external_email: grant.external_email,
        updated_at: now,
        ..connection.clone()
    };
    let mut conn = state.db.acquire().await?;
    db::calendar::upsert_connection(&mut conn, &refreshed).await?;

    debug!(user_id = %connection.user_id, provider = %connection.provider, "Calendar token refreshed");
    Ok(grant.access_token)
}

/// First configured connection of a user, if any
async fn usable_connection(state: &AppState, user_id: Uuid) -> Result<Option<CalendarConnection>> {
    let mut conn = state.db.acquire().await?;
    let connections = db::calendar::list_connections(&mut conn, user_id).await?;
    Ok(connections
        .into_iter()
        .find(|c| state.calendar.is_configured(c.provider)))
}

/// Push an interview to a panel member's calendar
///
/// Returns the provider and event id on success. Failures are logged and
/// reported as `None`.
pub async fn push_interview(
    state: &AppState,
    user_id: Uuid,
    interview: &Interview,
) -> Option<(CalendarProviderKind, String)> {
    let result: Result<Option<(CalendarProviderKind, String)>> = async {
        let Some(connection) = usable_connection(state, user_id).await? else {
            return Ok(None);
        };
        let token = access_token(state, &connection).await?;
        let provider = state.calendar.get(connection.provider)?;
        let event = CalendarEvent {
            title: interview.title.clone(),
            description: interview.notes.clone(),
            starts_at: interview.starts_at,
            ends_at: interview.ends_at,
            location: interview.location.clone().or_else(|| interview.meeting_url.clone()),
        };
        let event_id = provider.create_event(&token, &event).await?;
        Ok(Some((connection.provider, event_id)))
    }
    .await;

    match result {
        Ok(pushed) => pushed,
        Err(e) => {
            warn!(user_id = %user_id, interview_id = %interview.id, error = %e, "Calendar push failed");
            None
        }
    }
}

/// Remove a previously pushed event; failures are logged only
pub async fn remove_event(state: &AppState, user_id: Uuid, kind: CalendarProviderKind, event_id: &str) {
    let result: Result<()> = async {
        let connection = {
            let mut conn = state.db.acquire().await?;
            db::calendar::get_connection(&mut conn, user_id, kind).await?
        };
        let Some(connection) = connection else {
            return Ok(());
        };
        let token = access_token(state, &connection).await?;
        state.calendar.get(kind)?.delete_event(&token, event_id).await
    }
    .await;

    if let Err(e) = result {
        warn!(user_id = %user_id, provider = %kind, error = %e, "Calendar event removal failed");
    }
}

/// Parse a comma-separated list of user ids
fn parse_user_ids(raw: &str) -> Result<Vec<Uuid>> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = Uuid::parse_str(part)
            .map_err(|_| Error::InvalidInput(format!("invalid user id '{}'", part)))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(Error::InvalidInput("user_ids must not be empty".to_string()));
    }
    Ok(ids)
}

fn validate_range(query: &AvailabilityQuery) -> Result<()> {
    if query.to <= query.from {
        return Err(Error::InvalidInput("to must be after from".to_string()));
    }
    if query.to - query.from > Duration::days(MAX_RANGE_DAYS) {
        return Err(Error::InvalidInput(format!(
            "range must not exceed {} days",
            MAX_RANGE_DAYS
        )));
    }
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&query.duration_minutes) {
        return Err(Error::InvalidInput(format!(
            "duration_minutes must be between {} and {}",
            MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
        )));
    }
    Ok(())
}

/// Common free windows for a set of users
pub async fn availability(state: &AppState, actor: &Actor, query: AvailabilityQuery) -> Result<Availability> {
    actor.role.require_min(Role::Recruiter)?;
    validate_range(&query)?;
    let user_ids = parse_user_ids(&query.user_ids)?;

    let mut busy = Vec::new();
    for &user_id in &user_ids {
        {
            let mut conn = state.db.acquire().await?;
            db::users::get(&mut conn, actor.company_id, user_id)
                .await?
                .ok_or_else(|| Error::not_found("user", user_id))?;
            let scheduled = db::interviews::busy_windows(&mut conn, user_id, query.from, query.to).await?;
            busy.extend(scheduled.into_iter().map(|(s, e)| TimeWindow::new(s, e)));
        }

        if let Some(connection) = usable_connection(state, user_id).await? {
            let external: Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> = async {
                let token = access_token(state, &connection).await?;
                state
                    .calendar
                    .get(connection.provider)?
                    .busy_times(&token, query.from, query.to)
                    .await
            }
            .await;
            match external {
                Ok(times) => busy.extend(times.into_iter().map(|(s, e)| TimeWindow::new(s, e))),
                Err(e) => warn!(user_id = %user_id, error = %e, "Calendar busy lookup failed"),
            }
        }
    }

    let busy = availability::merge_intervals(busy);
    let free = availability::free_windows(
        &busy,
        query.from,
        query.to,
        Duration::minutes(query.duration_minutes),
        state.calendar.working_hours,
    );

    Ok(Availability {
        user_ids,
        from: query.from,
        to: query.to,
        duration_minutes: query.duration_minutes,
        busy,
        free,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_refresh_margin() {
        let now = Utc::now();
        assert!(!needs_refresh(None, now));
        assert!(!needs_refresh(Some(now + Duration::seconds(120)), now));
        assert!(needs_refresh(Some(now + Duration::seconds(60)), now));
        assert!(needs_refresh(Some(now - Duration::seconds(5)), now));
    }

    #[test]
    fn test_parse_user_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(parse_user_ids(&format!("{}, {},{}", a, b, a)).unwrap(), vec![a, b]);
        assert!(parse_user_ids("").is_err());
        assert!(parse_user_ids("nope").is_err());
    }

    #[test]
    fn test_range_validation() {
        let from = Utc::now();
        let query = |to_days: i64, minutes: i64| AvailabilityQuery {
            user_ids: String::new(),
            from,
            to: from + Duration::days(to_days),
            duration_minutes: minutes,
        };
        assert!(validate_range(&query(1, 30)).is_ok());
        assert!(validate_range(&query(0, 30)).is_err());
        assert!(validate_range(&query(32, 30)).is_err());
        assert!(validate_range(&query(1, 10)).is_err());
        assert!(validate_range(&query(1, 481)).is_err());
    }
}
