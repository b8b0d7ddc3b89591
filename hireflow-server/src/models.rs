//! Domain records shared by the data layer, services and handlers

use chrono::{DateTime, Utc};
use hireflow_common::auth::{Permission, Role};
use hireflow_common::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a closed set of lowercase string values stored as TEXT
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(
    /// Job lifecycle status
    JobStatus {
        Draft => "draft",
        Open => "open",
        OnHold => "on_hold",
        Closed => "closed",
    }
);

text_enum!(
    /// Application status
    ApplicationStatus {
        Active => "active",
        Hired => "hired",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
);

text_enum!(
    ActivityType {
        CandidateAdded => "candidate_added",
        StageChange => "stage_change",
        StatusChanged => "status_changed",
        NoteAdded => "note_added",
        ResumeUploaded => "resume_uploaded",
        InterviewScheduled => "interview_scheduled",
        InterviewRescheduled => "interview_rescheduled",
        InterviewCancelled => "interview_cancelled",
        InterviewCompleted => "interview_completed",
        FeedbackSubmitted => "feedback_submitted",
        ScoreUpdated => "score_updated",
    }
);

text_enum!(
    InterviewType {
        Phone => "phone",
        Video => "video",
        Onsite => "onsite",
        Technical => "technical",
        Panel => "panel",
    }
);

text_enum!(
    InterviewStatus {
        Scheduled => "scheduled",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

text_enum!(
    Recommendation {
        StrongYes => "strong_yes",
        Yes => "yes",
        No => "no",
        StrongNo => "strong_no",
    }
);

text_enum!(
    /// External calendar provider
    CalendarProviderKind {
        Google => "google",
        Microsoft => "microsoft",
    }
);

/// The authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn require(&self, permission: Permission) -> Result<()> {
        self.role.require(permission)
    }

    pub fn is_vendor(&self) -> bool {
        self.role.is_vendor()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user as exposed over the API (no password material)
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub employment_type: String,
    pub description: Option<String>,
    pub status: JobStatus,
    pub hiring_manager_id: Option<Uuid>,
    pub recruiter_id: Option<Uuid>,
    pub openings: i64,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Job listing row with its active application count
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    #[serde(flatten)]
    pub job: Job,
    pub active_candidates: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStage {
    pub id: Uuid,
    pub job_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub position: i64,
    pub is_default: bool,
    pub is_mandatory: bool,
    pub created_at: DateTime<Utc>,
}

/// A stage with its live candidate count and ordered sub-stages
#[derive(Debug, Clone, Serialize)]
pub struct StageNode {
    #[serde(flatten)]
    pub stage: PipelineStage,
    pub candidate_count: i64,
    pub sub_stages: Vec<StageNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: Uuid,
    pub company_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub skills: Vec<String>,
    pub source: Option<String>,
    pub linkedin_url: Option<String>,
    pub summary: Option<String>,
    pub resume_url: Option<String>,
    pub resume_file_name: Option<String>,
    pub resume_text: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A candidate's application to one job
#[derive(Debug, Clone, Serialize)]
pub struct JobCandidate {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_id: Uuid,
    pub current_stage_id: Uuid,
    pub status: ApplicationStatus,
    pub score: Option<i64>,
    pub submitted_by_vendor_id: Option<Uuid>,
    pub applied_at: DateTime<Utc>,
    pub stage_entered_at: DateTime<Utc>,
    pub hired_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

/// Application joined with the names a board view needs
#[derive(Debug, Clone, Serialize)]
pub struct JobCandidateView {
    #[serde(flatten)]
    pub application: JobCandidate,
    pub candidate_name: String,
    pub candidate_email: String,
    pub stage_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub id: Uuid,
    pub job_candidate_id: Uuid,
    pub activity_type: ActivityType,
    pub actor_id: Option<Uuid>,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageHistoryEntry {
    pub id: Uuid,
    pub job_candidate_id: Uuid,
    pub from_stage_id: Option<Uuid>,
    pub to_stage_id: Uuid,
    pub moved_by: Option<Uuid>,
    pub moved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Interview {
    pub id: Uuid,
    pub job_candidate_id: Uuid,
    pub title: String,
    pub interview_type: InterviewType,
    pub status: InterviewStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub meeting_url: Option<String>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelMember {
    pub interview_id: Uuid,
    pub user_id: Uuid,
    pub calendar_provider: Option<CalendarProviderKind>,
    pub calendar_event_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub user_id: Uuid,
    pub rating: i64,
    pub recommendation: Recommendation,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Interview with its panel and submitted feedback
#[derive(Debug, Clone, Serialize)]
pub struct InterviewDetail {
    #[serde(flatten)]
    pub interview: Interview,
    pub panel: Vec<PanelMember>,
    pub feedback: Vec<Feedback>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VendorAssignment {
    pub vendor_id: Uuid,
    pub job_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlaConfig {
    pub id: Uuid,
    pub company_id: Uuid,
    pub stage_name: String,
    pub max_days: i64,
    pub warning_days: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored OAuth tokens for one user and provider
///
/// Tokens never leave the server.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarConnection {
    pub user_id: Uuid,
    pub provider: CalendarProviderKind,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub external_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_enum_round_trip() {
        assert_eq!("on_hold".parse::<JobStatus>().unwrap(), JobStatus::OnHold);
        assert_eq!(JobStatus::OnHold.as_str(), "on_hold");
        assert_eq!(
            serde_json::to_string(&Recommendation::StrongYes).unwrap(),
            "\"strong_yes\""
        );
        assert!("archived".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_connection_tokens_not_serialized() {
        let now = Utc::now();
        let conn = CalendarConnection {
            user_id: Uuid::new_v4(),
            provider: CalendarProviderKind::Google,
            access_token: "secret-access".to_string(),
            refresh_token: Some("secret-refresh".to_string()),
            expires_at: None,
            external_email: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&conn).unwrap();
        assert!(!json.contains("secret-access"));
        assert!(!json.contains("secret-refresh"));
    }
}
