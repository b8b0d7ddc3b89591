//! Stage SLA configuration, breach detection and the background sweeper

use super::notifications::{self, NotificationDraft};
use super::applications::application_link;
use super::required;
use crate::db;
use crate::db::sla::SlaCandidateRow;
use crate::models::{Actor, SlaConfig};
use crate::AppState;
use chrono::{DateTime, Utc};
use hireflow_common::auth::Permission;
use hireflow_common::db::settings::{set_setting, SLA_LAST_SWEEP_KEY};
use hireflow_common::events::AtsEvent;
use hireflow_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SlaConfigRequest {
    pub stage_name: String,
    pub max_days: i64,
    pub warning_days: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaState {
    AtRisk,
    Breached,
}

/// An application at or over its stage limit
#[derive(Debug, Clone, Serialize)]
pub struct SlaBreach {
    pub job_candidate_id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub stage_id: Uuid,
    pub stage_name: String,
    pub stage_entered_at: DateTime<Utc>,
    pub days_in_stage: i64,
    pub max_days: i64,
    pub warning_days: Option<i64>,
    pub days_over: i64,
    pub state: SlaState,
    #[serde(skip)]
    hiring_manager_id: Option<Uuid>,
    #[serde(skip)]
    recruiter_id: Option<Uuid>,
}

/// Classify a stay of `days` whole days against a limit
pub fn classify(days: i64, max_days: i64, warning_days: Option<i64>) -> Option<SlaState> {
    if days > max_days {
        Some(SlaState::Breached)
    } else if warning_days.is_some_and(|w| days >= w) {
        Some(SlaState::AtRisk)
    } else {
        None
    }
}

fn validate(req: &SlaConfigRequest) -> Result<String> {
    let stage_name = required(&req.stage_name, "stage_name")?;
    if req.max_days < 1 {
        return Err(Error::InvalidInput("max_days must be at least 1".to_string()));
    }
    if let Some(w) = req.warning_days {
        if w < 0 || w >= req.max_days {
            return Err(Error::InvalidInput(
                "warning_days must be between 0 and max_days - 1".to_string(),
            ));
        }
    }
    Ok(stage_name)
}

/// Create or replace the config for a stage name (case-insensitive)
pub async fn upsert_config(state: &AppState, actor: &Actor, req: SlaConfigRequest) -> Result<SlaConfig> {
    actor.require(Permission::ManageSla)?;
    let stage_name = validate(&req)?;

    let mut tx = state.db.begin().await?;
    let now = time::now();
    let config = match db::sla::find_config_by_stage(&mut *tx, actor.company_id, &stage_name).await? {
        Some(mut existing) => {
            existing.stage_name = stage_name;
            existing.max_days = req.max_days;
            existing.warning_days = req.warning_days;
            existing.updated_at = now;
            db::sla::update_config(&mut *tx, &existing).await?;
            existing
        }
        None => {
            let config = SlaConfig {
                id: Uuid::new_v4(),
                company_id: actor.company_id,
                stage_name,
                max_days: req.max_days,
                warning_days: req.warning_days,
                created_at: now,
                updated_at: now,
            };
            db::sla::insert_config(&mut *tx, &config).await?;
            config
        }
    };
    tx.commit().await?;

    info!(stage = %config.stage_name, max_days = config.max_days, "SLA config saved");
    Ok(config)
}

pub async fn list_configs(state: &AppState, actor: &Actor) -> Result<Vec<SlaConfig>> {
    actor.require(Permission::ViewAnalytics)?;
    let mut conn = state.db.acquire().await?;
    db::sla::list_configs(&mut conn, actor.company_id).await
}

pub async fn delete_config(state: &AppState, actor: &Actor, id: Uuid) -> Result<()> {
    actor.require(Permission::ManageSla)?;
    let mut conn = state.db.acquire().await?;
    if !db::sla::delete_config(&mut conn, actor.company_id, id).await? {
        return Err(Error::not_found("sla config", id));
    }
    Ok(())
}

fn evaluate(row: SlaCandidateRow, now: DateTime<Utc>) -> Option<SlaBreach> {
    let days_in_stage = time::whole_days_between(&row.stage_entered_at, &now);
    let state = classify(days_in_stage, row.max_days, row.warning_days)?;
    Some(SlaBreach {
        job_candidate_id: row.job_candidate_id,
        job_id: row.job_id,
        job_title: row.job_title,
        candidate_id: row.candidate_id,
        candidate_name: row.candidate_name,
        stage_id: row.stage_id,
        stage_name: row.stage_name,
        stage_entered_at: row.stage_entered_at,
        days_in_stage,
        max_days: row.max_days,
        warning_days: row.warning_days,
        days_over: days_in_stage - row.max_days,
        state,
        hiring_manager_id: row.hiring_manager_id,
        recruiter_id: row.recruiter_id,
    })
}

/// Applications at risk or over their limit, worst first
pub async fn detect_breaches(
    conn: &mut SqliteConnection,
    company_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<SlaBreach>> {
    let rows = db::sla::active_in_configured_stages(conn, company_id).await?;
    let mut breaches: Vec<SlaBreach> = rows.into_iter().filter_map(|r| evaluate(r, now)).collect();
    breaches.sort_by(|a, b| {
        b.days_over
            .cmp(&a.days_over)
            .then_with(|| a.stage_entered_at.cmp(&b.stage_entered_at))
    });
    Ok(breaches)
}

pub async fn breaches(state: &AppState, actor: &Actor) -> Result<Vec<SlaBreach>> {
    actor.require(Permission::ViewAnalytics)?;
    let mut conn = state.db.acquire().await?;
    detect_breaches(&mut conn, actor.company_id, time::now()).await
}

/// Alert on breaches not yet alerted for their stage entry
///
/// Returns the number of new alerts.
pub async fn check_and_notify(state: &AppState, company_id: Uuid, now: DateTime<Utc>) -> Result<usize> {
    let mut tx = state.db.begin().await?;
    let found = detect_breaches(&mut *tx, company_id, now).await?;

    let mut admins: Option<Vec<Uuid>> = None;
    let mut events = Vec::new();
    let mut created = Vec::new();

    for breach in found.into_iter().filter(|b| b.state == SlaState::Breached) {
        let fresh = db::sla::record_alert(
            &mut *tx,
            breach.job_candidate_id,
            breach.stage_id,
            breach.stage_entered_at,
            now,
        )
        .await?;
        if !fresh {
            continue;
        }

        let mut recipients: Vec<Uuid> = [breach.hiring_manager_id, breach.recruiter_id]
            .into_iter()
            .flatten()
            .collect();
        if recipients.is_empty() {
            if admins.is_none() {
                admins = Some(db::users::active_admin_ids(&mut *tx, company_id).await?);
            }
            recipients = admins.clone().unwrap_or_default();
        }

        let draft = NotificationDraft::new(
            "sla_breach",
            format!("SLA breached: {} in {}", breach.candidate_name, breach.stage_name),
            format!(
                "{} has been in {} for {} days (limit {}) on {}",
                breach.candidate_name, breach.stage_name, breach.days_in_stage, breach.max_days, breach.job_title
            ),
        )
        .with_link(application_link(breach.job_id, breach.job_candidate_id));
        created.extend(notifications::create(&mut *tx, company_id, &recipients, &draft).await?);

        events.push(AtsEvent::SlaBreached {
            company_id,
            job_id: breach.job_id,
            job_candidate_id: breach.job_candidate_id,
            stage_name: breach.stage_name,
            days_in_stage: breach.days_in_stage,
            max_days: breach.max_days,
            timestamp: now,
        });
    }
    tx.commit().await?;

    let alerted = events.len();
    for event in events {
        state.event_bus.emit(event);
    }
    notifications::publish(&state.event_bus, &created);

    if alerted > 0 {
        info!(company_id = %company_id, alerts = alerted, "SLA breaches alerted");
    }
    Ok(alerted)
}

/// Manual check for the caller's company
pub async fn check_now(state: &AppState, actor: &Actor) -> Result<usize> {
    actor.require(Permission::ManageSla)?;
    check_and_notify(state, actor.company_id, time::now()).await
}

/// Run one sweep over every company
pub async fn sweep(state: &AppState) -> Result<usize> {
    let now = time::now();
    let company_ids = {
        let mut conn = state.db.acquire().await?;
        db::companies::list_ids(&mut conn).await?
    };

    let mut total = 0;
    for company_id in company_ids {
        match check_and_notify(state, company_id, now).await {
            Ok(n) => total += n,
            Err(e) => warn!(company_id = %company_id, error = %e, "SLA check failed"),
        }
    }

    set_setting(&state.db, SLA_LAST_SWEEP_KEY, time::to_db(&now)).await?;
    Ok(total)
}

/// Start the periodic sweeper; an interval of 0 disables it
pub fn spawn_sweeper(state: AppState, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        info!("SLA sweeper disabled");
        return None;
    }

    info!(interval_secs, "Starting SLA sweeper");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep(&state).await {
                Ok(alerts) => debug!(alerts, "SLA sweep complete"),
                Err(e) => warn!(error = %e, "SLA sweep failed"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(2, 5, Some(3)), None);
        assert_eq!(classify(3, 5, Some(3)), Some(SlaState::AtRisk));
        assert_eq!(classify(5, 5, Some(3)), Some(SlaState::AtRisk));
        assert_eq!(classify(6, 5, Some(3)), Some(SlaState::Breached));
        assert_eq!(classify(5, 5, None), None);
    }

    #[test]
    fn test_config_validation() {
        let ok = SlaConfigRequest {
            stage_name: " Screening ".to_string(),
            max_days: 5,
            warning_days: Some(4),
        };
        assert_eq!(validate(&ok).unwrap(), "Screening");

        let zero = SlaConfigRequest {
            stage_name: "Screening".to_string(),
            max_days: 0,
            warning_days: None,
        };
        assert!(validate(&zero).is_err());

        let warning_too_late = SlaConfigRequest {
            stage_name: "Screening".to_string(),
            max_days: 5,
            warning_days: Some(5),
        };
        assert!(validate(&warning_too_late).is_err());
    }
}
