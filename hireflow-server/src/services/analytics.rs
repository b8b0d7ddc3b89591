//! Hiring analytics

use crate::db;
use crate::models::{Actor, PipelineStage};
use crate::AppState;
use chrono::Duration;
use hireflow_common::auth::Permission;
use hireflow_common::{time, Error, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Window for the upcoming-interview count
pub const UPCOMING_DAYS: i64 = 7;

/// Window for the recent-hire count
pub const RECENT_HIRE_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub open_jobs: i64,
    pub total_candidates: i64,
    pub active_applications: i64,
    pub upcoming_interviews: i64,
    pub hires_last_30_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub stage_id: Uuid,
    pub name: String,
    pub position: i64,
    pub current: i64,
    pub reached: i64,
    pub conversion_from_first: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Funnel {
    pub job_id: Uuid,
    pub stages: Vec<FunnelStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeToHire {
    pub job_id: Option<Uuid>,
    pub hires: usize,
    pub average_days: Option<f64>,
    pub median_days: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: String,
    pub candidates: i64,
    pub hired: i64,
}

pub async fn overview(state: &AppState, actor: &Actor) -> Result<Overview> {
    actor.require(Permission::ViewAnalytics)?;

    let now = time::now();
    let mut conn = state.db.acquire().await?;
    Ok(Overview {
        open_jobs: db::analytics::count_open_jobs(&mut conn, actor.company_id).await?,
        total_candidates: db::analytics::count_candidates(&mut conn, actor.company_id).await?,
        active_applications: db::analytics::count_active_applications(&mut conn, actor.company_id).await?,
        upcoming_interviews: db::interviews::count_upcoming(
            &mut conn,
            actor.company_id,
            now,
            now + Duration::days(UPCOMING_DAYS),
        )
        .await?,
        hires_last_30_days: db::analytics::count_hires_since(
            &mut conn,
            actor.company_id,
            now - Duration::days(RECENT_HIRE_DAYS),
        )
        .await?,
    })
}

/// Fold sub-stage figures into their top-level stage
pub(crate) fn build_funnel(
    stages: &[PipelineStage],
    current: &[(Uuid, i64)],
    reached: &[(Uuid, Uuid)],
) -> Vec<FunnelStage> {
    let top_of: HashMap<Uuid, Uuid> = stages
        .iter()
        .map(|s| (s.id, s.parent_id.unwrap_or(s.id)))
        .collect();

    let mut current_by_top: HashMap<Uuid, i64> = HashMap::new();
    for (stage_id, n) in current {
        if let Some(top) = top_of.get(stage_id) {
            *current_by_top.entry(*top).or_default() += n;
        }
    }

    let mut reached_by_top: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
    for (stage_id, jc_id) in reached {
        if let Some(top) = top_of.get(stage_id) {
            reached_by_top.entry(*top).or_default().insert(*jc_id);
        }
    }

    let mut top_level: Vec<&PipelineStage> = stages.iter().filter(|s| s.parent_id.is_none()).collect();
    top_level.sort_by_key(|s| s.position);

    let mut first_reached: Option<i64> = None;
    top_level
        .into_iter()
        .map(|stage| {
            let reached = reached_by_top.get(&stage.id).map_or(0, |set| set.len() as i64);
            let base = *first_reached.get_or_insert(reached);
            let conversion_from_first = if base > 0 {
                reached as f64 / base as f64
            } else {
                0.0
            };
            FunnelStage {
                stage_id: stage.id,
                name: stage.name.clone(),
                position: stage.position,
                current: current_by_top.get(&stage.id).copied().unwrap_or(0),
                reached,
                conversion_from_first,
            }
        })
        .collect()
}

pub async fn job_funnel(state: &AppState, actor: &Actor, job_id: Uuid) -> Result<Funnel> {
    actor.require(Permission::ViewAnalytics)?;

    let mut conn = state.db.acquire().await?;
    db::jobs::get(&mut conn, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;

    let stages = db::stages::list_for_job(&mut conn, job_id).await?;
    let current = db::stages::active_counts(&mut conn, job_id).await?;
    let reached = db::analytics::stages_reached(&mut conn, job_id).await?;

    Ok(Funnel {
        job_id,
        stages: build_funnel(&stages, &current, &reached),
    })
}

/// Average and median of a set of durations in days
pub(crate) fn summarize(mut days: Vec<f64>) -> (Option<f64>, Option<f64>) {
    if days.is_empty() {
        return (None, None);
    }
    days.sort_by(|a, b| a.total_cmp(b));
    let average = days.iter().sum::<f64>() / days.len() as f64;
    let mid = days.len() / 2;
    let median = if days.len() % 2 == 0 {
        (days[mid - 1] + days[mid]) / 2.0
    } else {
        days[mid]
    };
    (Some(average), Some(median))
}

pub async fn time_to_hire(state: &AppState, actor: &Actor, job_id: Option<Uuid>) -> Result<TimeToHire> {
    actor.require(Permission::ViewAnalytics)?;

    let mut conn = state.db.acquire().await?;
    if let Some(id) = job_id {
        db::jobs::get(&mut conn, actor.company_id, id)
            .await?
            .ok_or_else(|| Error::not_found("job", id))?;
    }

    let days: Vec<f64> = db::analytics::hire_dates(&mut conn, actor.company_id, job_id)
        .await?
        .into_iter()
        .map(|(applied, hired)| (hired - applied).num_seconds().max(0) as f64 / 86_400.0)
        .collect();
    let hires = days.len();
    let (average_days, median_days) = summarize(days);

    Ok(TimeToHire {
        job_id,
        hires,
        average_days,
        median_days,
    })
}

pub async fn sources(state: &AppState, actor: &Actor) -> Result<Vec<SourceStats>> {
    actor.require(Permission::ViewAnalytics)?;

    let mut conn = state.db.acquire().await?;
    Ok(db::analytics::source_counts(&mut conn, actor.company_id)
        .await?
        .into_iter()
        .map(|(source, candidates, hired)| SourceStats {
            source,
            candidates,
            hired,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, position: i64, parent: Option<Uuid>) -> PipelineStage {
        PipelineStage {
            id: Uuid::new_v4(),
            job_id: Uuid::nil(),
            parent_id: parent,
            name: name.to_string(),
            position,
            is_default: false,
            is_mandatory: false,
            created_at: time::now(),
        }
    }

    #[test]
    fn test_funnel_folds_sub_stages() {
        let applied = stage("Applied", 0, None);
        let interview = stage("Interview", 1, None);
        let onsite = stage("Onsite", 0, Some(interview.id));
        let hired = stage("Hired", 2, None);
        let stages = vec![hired.clone(), onsite.clone(), applied.clone(), interview.clone()];

        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let reached = vec![
            (applied.id, a),
            (applied.id, b),
            (applied.id, c),
            (applied.id, d),
            (interview.id, a),
            (onsite.id, a),
            (onsite.id, b),
        ];
        let current = vec![(applied.id, 2), (onsite.id, 2)];

        let funnel = build_funnel(&stages, &current, &reached);
        let names: Vec<&str> = funnel.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Applied", "Interview", "Hired"]);

        assert_eq!(funnel[0].reached, 4);
        assert_eq!(funnel[1].reached, 2);
        assert_eq!(funnel[1].current, 2);
        assert_eq!(funnel[1].conversion_from_first, 0.5);
        assert_eq!(funnel[2].reached, 0);
        assert_eq!(funnel[2].conversion_from_first, 0.0);
    }

    #[test]
    fn test_funnel_with_no_history() {
        let stages = vec![stage("Applied", 0, None), stage("Hired", 1, None)];
        let funnel = build_funnel(&stages, &[], &[]);
        assert!(funnel.iter().all(|s| s.reached == 0 && s.conversion_from_first == 0.0));
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(vec![]), (None, None));
        assert_eq!(summarize(vec![10.0, 2.0, 3.0]), (Some(5.0), Some(3.0)));
        assert_eq!(summarize(vec![4.0, 1.0, 2.0, 3.0]), (Some(2.5), Some(2.5)));
    }
}
