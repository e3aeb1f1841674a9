use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::JobStatus;

/// Where the actor was when the status changed, as reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    #[serde(rename = "accuracy", default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

/// One applied transition. History entries are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from_status: JobStatus,
    pub to_status: JobStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
}

/// Audit metadata supplied by the caller with a transition request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionContext {
    pub actor: String,
    pub reason: Option<String>,
    pub geolocation: Option<Geolocation>,
}

impl TransitionContext {
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            ..Default::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn at(mut self, geolocation: Geolocation) -> Self {
        self.geolocation = Some(geolocation);
        self
    }
}

/// A unit of billable work tracked through [`JobStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Quote,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The most recent transition, if any.
    pub fn last_change(&self) -> Option<&StatusChange> {
        self.status_history.last()
    }

    /// Checks that every history entry follows the transition table and that
    /// consecutive entries chain into the current status. A job without
    /// history is trivially consistent.
    pub fn history_is_consistent(&self) -> bool {
        let Some(first) = self.status_history.first() else {
            return true;
        };
        let mut current = first.from_status;
        for change in &self.status_history {
            if change.from_status != current || !current.can_transition_to(change.to_status) {
                return false;
            }
            current = change.to_status;
        }
        current == self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::StateMachine;

    #[test]
    fn job_creation_defaults() {
        let job = Job::new("job-1");
        assert_eq!(job.status, JobStatus::Quote);
        assert!(job.status_history.is_empty());
        assert!(job.last_change().is_none());
        assert!(job.history_is_consistent());
    }

    #[test]
    fn wire_shape_uses_camel_case() {
        let mut job = Job::new("job-5");
        StateMachine::request_transition(
            &mut job,
            JobStatus::Approved,
            TransitionContext::by("office").with_reason("signed quote"),
        )
        .unwrap();

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "approved");
        assert_eq!(json["statusHistory"][0]["fromStatus"], "quote");
        assert_eq!(json["statusHistory"][0]["toStatus"], "approved");
        assert_eq!(json["statusHistory"][0]["changedBy"], "office");
        assert!(json["statusHistory"][0].get("geolocation").is_none());
    }

    #[test]
    fn geolocation_accuracy_wire_name() {
        let geo = Geolocation {
            latitude: 52.5,
            longitude: 13.4,
            accuracy_m: Some(8.0),
        };
        let json = serde_json::to_value(&geo).unwrap();
        assert_eq!(json["accuracy"], 8.0);
        assert!(json.get("accuracyM").is_none());

        let back: Geolocation = serde_json::from_value(json).unwrap();
        assert_eq!(back, geo);
    }

    #[test]
    fn deserializes_backend_job_without_history() {
        let json = r#"{
            "id": "J-100",
            "status": "in_progress",
            "createdAt": "2026-01-05T09:00:00Z",
            "updatedAt": "2026-01-05T10:30:00Z"
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.status_history.is_empty());
    }

    #[test]
    fn consistency_check_flags_forged_history() {
        let mut job = Job::new("job-2");
        job.status = JobStatus::Paid;
        job.status_history.push(StatusChange {
            from_status: JobStatus::Quote,
            to_status: JobStatus::Paid,
            changed_by: "nobody".into(),
            changed_at: Utc::now(),
            reason: None,
            geolocation: None,
        });
        assert!(!job.history_is_consistent());
    }

    #[test]
    fn context_builder() {
        let ctx = TransitionContext::by("tech")
            .with_reason("arrived")
            .at(Geolocation {
                latitude: 1.0,
                longitude: 2.0,
                accuracy_m: None,
            });
        assert_eq!(ctx.actor, "tech");
        assert_eq!(ctx.reason.as_deref(), Some("arrived"));
        assert!(ctx.geolocation.is_some());
    }
}
