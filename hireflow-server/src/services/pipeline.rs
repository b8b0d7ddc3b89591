//! Pipeline stage management
//!
//! Positions are kept contiguous (`0..n`) within each sibling group
//! `(job_id, parent_id)`. Every mutation runs in one transaction.

use super::applications::move_application;
use super::{required, visible_job};
use crate::db;
use crate::models::{Actor, PipelineStage, StageNode};
use crate::AppState;
use hireflow_common::auth::Permission;
use hireflow_common::events::AtsEvent;
use hireflow_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct NewStage {
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub position: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StageUpdate {
    pub name: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub parent_id: Option<Uuid>,
    pub ordered_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StageDeleted {
    pub deleted_stage_id: Uuid,
    pub moved_candidates: usize,
}

/// Assemble stages into top-level nodes with nested sub-stages
///
/// `stages` must be ordered by position within each sibling group.
pub(crate) fn build_tree(stages: Vec<PipelineStage>, counts: &HashMap<Uuid, i64>) -> Vec<StageNode> {
    let mut children: HashMap<Uuid, Vec<StageNode>> = HashMap::new();
    let mut top = Vec::new();

    for stage in stages {
        let node = StageNode {
            candidate_count: counts.get(&stage.id).copied().unwrap_or(0),
            stage,
            sub_stages: Vec::new(),
        };
        match node.stage.parent_id {
            Some(parent) => children.entry(parent).or_default().push(node),
            None => top.push(node),
        }
    }

    top.sort_by_key(|n| n.stage.position);
    for node in &mut top {
        if let Some(mut subs) = children.remove(&node.stage.id) {
            subs.sort_by_key(|n| n.stage.position);
            node.sub_stages = subs;
        }
    }
    top
}

/// Resolve where a new stage lands among `len` siblings
///
/// Missing or past-the-end positions append.
pub(crate) fn insert_position(requested: Option<i64>, len: i64) -> Result<i64> {
    match requested {
        None => Ok(len),
        Some(p) if p < 0 => Err(Error::InvalidInput("position must not be negative".to_string())),
        Some(p) => Ok(p.min(len)),
    }
}

/// Check that `ordered` is exactly a permutation of `current`
pub(crate) fn validate_permutation(current: &[Uuid], ordered: &[Uuid]) -> Result<()> {
    let known: HashSet<Uuid> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(ordered.len());

    for id in ordered {
        if !known.contains(id) {
            return Err(Error::InvalidInput(format!(
                "stage {} is not part of this stage group",
                id
            )));
        }
        if !seen.insert(*id) {
            return Err(Error::InvalidInput(format!("stage {} is listed twice", id)));
        }
    }

    if seen.len() != known.len() {
        let missing = current.iter().filter(|id| !seen.contains(id)).count();
        return Err(Error::InvalidInput(format!(
            "ordered_ids is missing {} stage(s) of this group",
            missing
        )));
    }

    Ok(())
}

fn ensure_unique_name(siblings: &[PipelineStage], name: &str, except: Option<Uuid>) -> Result<()> {
    let clash = siblings
        .iter()
        .filter(|s| Some(s.id) != except)
        .any(|s| s.name.eq_ignore_ascii_case(name));
    if clash {
        return Err(Error::Conflict(format!("a stage named '{}' already exists here", name)));
    }
    Ok(())
}

/// Rewrite sibling positions to `0..n` in their current order
async fn compact(conn: &mut SqliteConnection, job_id: Uuid, parent_id: Option<Uuid>) -> Result<()> {
    let siblings = db::stages::list_siblings(&mut *conn, job_id, parent_id).await?;
    for (index, stage) in siblings.iter().enumerate() {
        let index = index as i64;
        if stage.position != index {
            db::stages::set_position(&mut *conn, stage.id, index).await?;
        }
    }
    Ok(())
}

async fn load_stage(conn: &mut SqliteConnection, job_id: Uuid, stage_id: Uuid) -> Result<PipelineStage> {
    db::stages::get(conn, job_id, stage_id)
        .await?
        .ok_or_else(|| Error::not_found("stage", stage_id))
}

pub async fn list_stages(state: &AppState, actor: &Actor, job_id: Uuid) -> Result<Vec<StageNode>> {
    actor.require(Permission::ViewJobs)?;

    let mut conn = state.db.acquire().await?;
    visible_job(&mut conn, actor, job_id).await?;

    let stages = db::stages::list_for_job(&mut conn, job_id).await?;
    let counts: HashMap<Uuid, i64> = db::stages::active_counts(&mut conn, job_id)
        .await?
        .into_iter()
        .collect();

    Ok(build_tree(stages, &counts))
}

pub async fn add_stage(state: &AppState, actor: &Actor, job_id: Uuid, new: NewStage) -> Result<PipelineStage> {
    actor.require(Permission::ManagePipeline)?;
    let name = required(&new.name, "name")?;

    let mut tx = state.db.begin().await?;
    db::jobs::get(&mut *tx, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;

    if let Some(parent_id) = new.parent_id {
        let parent = db::stages::get(&mut *tx, job_id, parent_id)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("parent stage {} is not part of this job", parent_id)))?;
        if parent.parent_id.is_some() {
            return Err(Error::InvalidInput(
                "sub-stages can only be added to top-level stages".to_string(),
            ));
        }
    }

    let siblings = db::stages::list_siblings(&mut *tx, job_id, new.parent_id).await?;
    ensure_unique_name(&siblings, &name, None)?;

    let position = insert_position(new.position, siblings.len() as i64)?;
    if position < siblings.len() as i64 {
        db::stages::shift_from(&mut *tx, job_id, new.parent_id, position).await?;
    }

    let stage = PipelineStage {
        id: Uuid::new_v4(),
        job_id,
        parent_id: new.parent_id,
        name,
        position,
        is_default: false,
        is_mandatory: false,
        created_at: time::now(),
    };
    db::stages::insert(&mut *tx, &stage).await?;
    tx.commit().await?;

    info!(job_id = %job_id, stage_id = %stage.id, position, "Stage added");
    Ok(stage)
}

pub async fn update_stage(
    state: &AppState,
    actor: &Actor,
    job_id: Uuid,
    stage_id: Uuid,
    update: StageUpdate,
) -> Result<PipelineStage> {
    actor.require(Permission::ManagePipeline)?;

    let mut tx = state.db.begin().await?;
    db::jobs::get(&mut *tx, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;
    let mut stage = load_stage(&mut *tx, job_id, stage_id).await?;

    if let Some(name) = update.name {
        let name = required(&name, "name")?;
        if name != stage.name {
            if stage.is_mandatory {
                return Err(Error::InvalidInput(format!(
                    "mandatory stage '{}' cannot be renamed",
                    stage.name
                )));
            }
            let siblings = db::stages::list_siblings(&mut *tx, job_id, stage.parent_id).await?;
            ensure_unique_name(&siblings, &name, Some(stage.id))?;
            db::stages::rename(&mut *tx, stage.id, &name).await?;
            stage.name = name;
        }
    }

    match update.is_default {
        Some(true) if !stage.is_default => {
            if stage.parent_id.is_some() {
                return Err(Error::InvalidInput(
                    "only top-level stages can be the default".to_string(),
                ));
            }
            db::stages::set_default(&mut *tx, job_id, stage.id).await?;
            stage.is_default = true;
        }
        Some(false) if stage.is_default => {
            return Err(Error::InvalidInput(
                "a job must keep a default stage; mark another stage as default instead".to_string(),
            ));
        }
        _ => {}
    }

    tx.commit().await?;
    Ok(stage)
}

/// Delete a stage, relocating its candidates to `move_to_stage_id`
pub async fn delete_stage(
    state: &AppState,
    actor: &Actor,
    job_id: Uuid,
    stage_id: Uuid,
    move_to_stage_id: Option<Uuid>,
) -> Result<StageDeleted> {
    actor.require(Permission::ManagePipeline)?;

    let mut tx = state.db.begin().await?;
    db::jobs::get(&mut *tx, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;
    let stage = load_stage(&mut *tx, job_id, stage_id).await?;

    if stage.is_mandatory {
        return Err(Error::InvalidInput(format!(
            "mandatory stage '{}' cannot be deleted",
            stage.name
        )));
    }
    if stage.is_default {
        return Err(Error::InvalidInput(
            "the default stage cannot be deleted".to_string(),
        ));
    }
    if db::stages::child_count(&mut *tx, stage.id).await? > 0 {
        return Err(Error::InvalidInput(format!(
            "stage '{}' has sub-stages; delete them first",
            stage.name
        )));
    }

    let occupants = db::applications::ids_in_stage(&mut *tx, stage.id).await?;
    let mut events: Vec<AtsEvent> = Vec::with_capacity(occupants.len());

    if !occupants.is_empty() {
        let target_id = move_to_stage_id.ok_or_else(|| {
            Error::InvalidInput(format!(
                "stage '{}' holds {} candidate(s); move_to_stage_id is required",
                stage.name,
                occupants.len()
            ))
        })?;
        if target_id == stage.id {
            return Err(Error::InvalidInput(
                "move_to_stage_id must differ from the deleted stage".to_string(),
            ));
        }
        let target = db::stages::get(&mut *tx, job_id, target_id)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("stage {} is not part of this job", target_id)))?;

        let now = time::now();
        for jc_id in &occupants {
            let jc = db::applications::get(&mut *tx, actor.company_id, *jc_id)
                .await?
                .ok_or_else(|| Error::not_found("job candidate", jc_id))?;
            let event = move_application(&mut *tx, actor.company_id, &jc, &stage, &target, Some(actor.user_id), now).await?;
            events.push(event);
        }
    }

    db::stages::delete(&mut *tx, stage.id).await?;
    compact(&mut *tx, job_id, stage.parent_id).await?;
    tx.commit().await?;

    for event in events {
        state.event_bus.emit(event);
    }

    info!(job_id = %job_id, stage_id = %stage.id, moved = occupants.len(), "Stage deleted");
    Ok(StageDeleted {
        deleted_stage_id: stage.id,
        moved_candidates: occupants.len(),
    })
}

/// Rewrite a sibling group's positions to match `ordered_ids`
pub async fn reorder_stages(
    state: &AppState,
    actor: &Actor,
    job_id: Uuid,
    req: ReorderRequest,
) -> Result<Vec<PipelineStage>> {
    actor.require(Permission::ManagePipeline)?;

    let mut tx = state.db.begin().await?;
    db::jobs::get(&mut *tx, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;

    let siblings = db::stages::list_siblings(&mut *tx, job_id, req.parent_id).await?;
    if siblings.is_empty() {
        return Err(Error::InvalidInput("this stage group is empty".to_string()));
    }
    let current: Vec<Uuid> = siblings.iter().map(|s| s.id).collect();
    validate_permutation(&current, &req.ordered_ids)?;

    for (index, id) in req.ordered_ids.iter().enumerate() {
        db::stages::set_position(&mut *tx, *id, index as i64).await?;
    }
    let reordered = db::stages::list_siblings(&mut *tx, job_id, req.parent_id).await?;
    tx.commit().await?;

    info!(job_id = %job_id, stages = reordered.len(), "Stages reordered");
    Ok(reordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stage(name: &str, parent: Option<Uuid>, position: i64) -> PipelineStage {
        PipelineStage {
            id: Uuid::new_v4(),
            job_id: Uuid::nil(),
            parent_id: parent,
            name: name.to_string(),
            position,
            is_default: false,
            is_mandatory: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_position() {
        assert_eq!(insert_position(None, 4).unwrap(), 4);
        assert_eq!(insert_position(Some(0), 4).unwrap(), 0);
        assert_eq!(insert_position(Some(2), 4).unwrap(), 2);
        assert_eq!(insert_position(Some(4), 4).unwrap(), 4);
        assert_eq!(insert_position(Some(99), 4).unwrap(), 4);
        assert!(insert_position(Some(-1), 4).is_err());
    }

    #[test]
    fn test_permutation_accepts_reordering() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let reversed: Vec<Uuid> = ids.iter().rev().copied().collect();
        assert!(validate_permutation(&ids, &reversed).is_ok());
        assert!(validate_permutation(&ids, &ids).is_ok());
    }

    #[test]
    fn test_permutation_rejections() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        let missing = vec![ids[0], ids[1]];
        let extra = vec![ids[0], ids[1], ids[2], Uuid::new_v4()];
        let duplicate = vec![ids[0], ids[1], ids[1]];
        let foreign = vec![ids[0], ids[1], Uuid::new_v4()];

        for ordered in [missing, extra, duplicate, foreign] {
            let err = validate_permutation(&ids, &ordered).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
    }

    #[test]
    fn test_build_tree_nests_and_orders() {
        let screening = stage("Screening", None, 1);
        let queue = stage("Queue", None, 0);
        let tech = stage("Tech", Some(screening.id), 1);
        let hr = stage("HR", Some(screening.id), 0);

        let mut counts = HashMap::new();
        counts.insert(queue.id, 3);
        counts.insert(tech.id, 2);

        let tree = build_tree(vec![screening.clone(), tech, queue, hr], &counts);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].stage.name, "Queue");
        assert_eq!(tree[0].candidate_count, 3);
        assert_eq!(tree[1].stage.id, screening.id);
        assert_eq!(tree[1].candidate_count, 0);

        let subs: Vec<&str> = tree[1].sub_stages.iter().map(|n| n.stage.name.as_str()).collect();
        assert_eq!(subs, ["HR", "Tech"]);
        assert_eq!(tree[1].sub_stages[1].candidate_count, 2);
    }

    #[test]
    fn test_unique_name_is_case_insensitive() {
        let siblings = vec![stage("Offer", None, 0)];
        assert!(ensure_unique_name(&siblings, "offer", None).is_err());
        assert!(ensure_unique_name(&siblings, "offer", Some(siblings[0].id)).is_ok());
        assert!(ensure_unique_name(&siblings, "Onsite", None).is_ok());
    }
}
