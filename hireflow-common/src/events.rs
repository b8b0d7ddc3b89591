//! Event types and the EventBus
//!
//! Domain services emit events after their transaction commits; the SSE
//! endpoint forwards them to connected clients of the same company.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Hireflow event types
///
/// Every variant carries the company it belongs to so that subscribers can
/// filter by tenant without a database round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AtsEvent {
    /// A notification row was created for one user
    NotificationCreated {
        company_id: Uuid,
        user_id: Uuid,
        notification_id: Uuid,
        kind: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// An application moved between pipeline stages
    CandidateStageChanged {
        company_id: Uuid,
        job_id: Uuid,
        job_candidate_id: Uuid,
        from_stage_id: Option<Uuid>,
        to_stage_id: Uuid,
        moved_by: Option<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// A bulk import finished
    CandidatesImported {
        company_id: Uuid,
        job_id: Option<Uuid>,
        created: usize,
        updated: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    InterviewScheduled {
        company_id: Uuid,
        interview_id: Uuid,
        job_candidate_id: Uuid,
        starts_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    InterviewCancelled {
        company_id: Uuid,
        interview_id: Uuid,
        job_candidate_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// An application exceeded its stage SLA
    SlaBreached {
        company_id: Uuid,
        job_id: Uuid,
        job_candidate_id: Uuid,
        stage_name: String,
        days_in_stage: i64,
        max_days: i64,
        timestamp: DateTime<Utc>,
    },
}

impl AtsEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            AtsEvent::NotificationCreated { .. } => "NotificationCreated",
            AtsEvent::CandidateStageChanged { .. } => "CandidateStageChanged",
            AtsEvent::CandidatesImported { .. } => "CandidatesImported",
            AtsEvent::InterviewScheduled { .. } => "InterviewScheduled",
            AtsEvent::InterviewCancelled { .. } => "InterviewCancelled",
            AtsEvent::SlaBreached { .. } => "SlaBreached",
        }
    }

    pub fn company_id(&self) -> Uuid {
        match self {
            AtsEvent::NotificationCreated { company_id, .. }
            | AtsEvent::CandidateStageChanged { company_id, .. }
            | AtsEvent::CandidatesImported { company_id, .. }
            | AtsEvent::InterviewScheduled { company_id, .. }
            | AtsEvent::InterviewCancelled { company_id, .. }
            | AtsEvent::SlaBreached { company_id, .. } => *company_id,
        }
    }

    /// Whether a given user of a given company should receive this event
    ///
    /// Notifications are private to their recipient; everything else is
    /// visible company-wide.
    pub fn is_visible_to(&self, company_id: Uuid, user_id: Uuid) -> bool {
        if self.company_id() != company_id {
            return false;
        }
        match self {
            AtsEvent::NotificationCreated { user_id: recipient, .. } => *recipient == user_id,
            _ => true,
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers observe `Lagged`, dropped receivers are cleaned up
/// automatically.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AtsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AtsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Having no subscribers is normal (no open SSE connections) and is only
    /// logged at debug level.
    pub fn emit(&self, event: AtsEvent) {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(event = event_type, receivers, "Event emitted");
            }
            Err(_) => {
                tracing::debug!(event = event_type, "Event emitted with no subscribers");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(company_id: Uuid, user_id: Uuid) -> AtsEvent {
        AtsEvent::NotificationCreated {
            company_id,
            user_id,
            notification_id: Uuid::new_v4(),
            kind: "test".to_string(),
            title: "Hello".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let company = Uuid::new_v4();
        bus.emit(notification(company, Uuid::new_v4()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "NotificationCreated");
        assert_eq!(event.company_id(), company);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit(notification(Uuid::new_v4(), Uuid::new_v4()));
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_visibility_rules() {
        let company = Uuid::new_v4();
        let user = Uuid::new_v4();
        let other_user = Uuid::new_v4();

        let event = notification(company, user);
        assert!(event.is_visible_to(company, user));
        assert!(!event.is_visible_to(company, other_user));
        assert!(!event.is_visible_to(Uuid::new_v4(), user));

        let moved = AtsEvent::CandidateStageChanged {
            company_id: company,
            job_id: Uuid::new_v4(),
            job_candidate_id: Uuid::new_v4(),
            from_stage_id: None,
            to_stage_id: Uuid::new_v4(),
            moved_by: None,
            timestamp: Utc::now(),
        };
        assert!(moved.is_visible_to(company, other_user));
    }

    #[test]
    fn test_serialization_is_tagged() {
        let json = serde_json::to_value(notification(Uuid::new_v4(), Uuid::new_v4())).unwrap();
        assert_eq!(json["type"], "NotificationCreated");
    }
}
