//! Domain services
//!
//! Services enforce permissions, validate input and own transactions.
//! Events and notifications are published only after a commit.

pub mod analytics;
pub mod applications;
pub mod auth;
pub mod bulk;
pub mod calendar;
pub mod candidates;
pub mod interviews;
pub mod jobs;
pub mod notifications;
pub mod pipeline;
pub mod search;
pub mod sla;
pub mod users;
pub mod vendors;

use crate::db;
use crate::models::{Actor, Job, JobStatus};
use hireflow_common::{Error, Result};
use serde::{Deserialize, Deserializer};
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Trim an optional string, mapping blank to None
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim a required string, rejecting blank values
pub(crate) fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Lowercase and syntactically validate an email address
pub(crate) fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(Error::InvalidInput(format!("invalid email address '{}'", email)))
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// Load a job the caller may see
///
/// Other companies' jobs are NotFound. Vendors see only open jobs assigned
/// to them; anything else is also NotFound.
pub(crate) async fn visible_job(conn: &mut SqliteConnection, actor: &Actor, job_id: Uuid) -> Result<Job> {
    let job = db::jobs::get(&mut *conn, actor.company_id, job_id)
        .await?
        .ok_or_else(|| Error::not_found("job", job_id))?;

    if actor.is_vendor() {
        let assigned = db::vendors::is_assigned(&mut *conn, actor.user_id, job_id).await?;
        if !assigned || job.status != JobStatus::Open {
            return Err(Error::not_found("job", job_id));
        }
    }

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["", "ada", "ada@", "@example.com", "ada@example", "a b@example.com", "a@b@c.com", "ada@example..com"] {
            assert!(normalize_email(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_clean_and_required() {
        assert_eq!(clean(Some("  x ".into())), Some("x".into()));
        assert_eq!(clean(Some("   ".into())), None);
        assert_eq!(clean(None), None);
        assert!(required("  ", "title").is_err());
        assert_eq!(required(" Engineer ", "title").unwrap(), "Engineer");
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        recruiter_id: Option<Option<Uuid>>,
    }

    #[test]
    fn test_nullable_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.recruiter_id, None);
        let null: Patch = serde_json::from_str(r#"{"recruiter_id": null}"#).unwrap();
        assert_eq!(null.recruiter_id, Some(None));
    }
}
