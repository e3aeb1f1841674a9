use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::job::{Job, StatusChange, TransitionContext};

/// The fixed lifecycle of a job, from quote to closure.
///
/// `Paid`, `Closed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Quote,
    Approved,
    Scheduled,
    InTransit,
    InProgress,
    PendingReview,
    Completed,
    Invoiced,
    Paid,
    Closed,
    Cancelled,
    OnHold,
    RequiresParts,
    CallbackNeeded,
}

impl JobStatus {
    pub const ALL: [JobStatus; 14] = [
        JobStatus::Quote,
        JobStatus::Approved,
        JobStatus::Scheduled,
        JobStatus::InTransit,
        JobStatus::InProgress,
        JobStatus::PendingReview,
        JobStatus::Completed,
        JobStatus::Invoiced,
        JobStatus::Paid,
        JobStatus::Closed,
        JobStatus::Cancelled,
        JobStatus::OnHold,
        JobStatus::RequiresParts,
        JobStatus::CallbackNeeded,
    ];

    /// The statuses directly reachable from `self`.
    pub fn allowed_transitions(self) -> &'static [JobStatus] {
        use JobStatus::*;
        match self {
            Quote => &[Approved, Cancelled],
            Approved => &[Scheduled, Cancelled],
            Scheduled => &[InTransit, InProgress, Cancelled, OnHold],
            InTransit => &[InProgress, OnHold],
            InProgress => &[PendingReview, Completed, OnHold, RequiresParts],
            PendingReview => &[Completed, InProgress],
            Completed => &[Invoiced],
            Invoiced => &[Paid],
            Paid => &[Closed],
            OnHold => &[Scheduled, InProgress, Cancelled],
            RequiresParts => &[InProgress, OnHold],
            CallbackNeeded => &[Scheduled, Cancelled],
            Closed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, target: JobStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Statuses where the job's work and billing are finished.
    ///
    /// `Paid` still has the bookkeeping edge to `Closed`; the other two have
    /// no outgoing edges at all.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Paid | JobStatus::Closed | JobStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Quote => "quote",
            JobStatus::Approved => "approved",
            JobStatus::Scheduled => "scheduled",
            JobStatus::InTransit => "in_transit",
            JobStatus::InProgress => "in_progress",
            JobStatus::PendingReview => "pending_review",
            JobStatus::Completed => "completed",
            JobStatus::Invoiced => "invoiced",
            JobStatus::Paid => "paid",
            JobStatus::Closed => "closed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::OnHold => "on_hold",
            JobStatus::RequiresParts => "requires_parts",
            JobStatus::CallbackNeeded => "callback_needed",
        }
    }

    /// What a workflow screen usually does after a job enters this status.
    pub fn follow_up(self) -> Option<FollowUp> {
        match self {
            JobStatus::Completed => Some(FollowUp::CaptureSignature),
            JobStatus::Invoiced => Some(FollowUp::GenerateInvoice),
            JobStatus::RequiresParts => Some(FollowUp::OrderParts),
            JobStatus::OnHold => Some(FollowUp::RecordHoldReason),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Follow-up action suggested to the caller. Never applied automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    CaptureSignature,
    GenerateInvoice,
    OrderParts,
    RecordHoldReason,
}

impl fmt::Display for FollowUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FollowUp::CaptureSignature => write!(f, "capture customer signature"),
            FollowUp::GenerateInvoice => write!(f, "generate invoice"),
            FollowUp::OrderParts => write!(f, "order required parts"),
            FollowUp::RecordHoldReason => write!(f, "record hold reason"),
        }
    }
}

/// A transition that is not an edge of the status table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move job from {from} to {to}; allowed: {}", format_allowed(.allowed))]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
    pub allowed: Vec<JobStatus>,
}

fn format_allowed(allowed: &[JobStatus]) -> String {
    if allowed.is_empty() {
        return "none (terminal)".to_string();
    }
    allowed
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validates and applies job status transitions.
pub struct StateMachine;

impl StateMachine {
    /// Move `job` to `target`, appending one history record.
    ///
    /// Fails without touching the job when `target` is not reachable from
    /// the current status. No follow-up transitions are triggered.
    pub fn request_transition(
        job: &mut Job,
        target: JobStatus,
        ctx: TransitionContext,
    ) -> Result<&Job, InvalidTransition> {
        let from = job.status;
        if !from.can_transition_to(target) {
            tracing::debug!(job_id = %job.id, %from, to = %target, "rejected status transition");
            return Err(InvalidTransition {
                from,
                to: target,
                allowed: from.allowed_transitions().to_vec(),
            });
        }

        let now = Utc::now();
        job.status_history.push(StatusChange {
            from_status: from,
            to_status: target,
            changed_by: ctx.actor,
            changed_at: now,
            reason: ctx.reason,
            geolocation: ctx.geolocation,
        });
        job.status = target;
        job.updated_at = now;

        tracing::info!(job_id = %job.id, %from, to = %target, "job status changed");
        Ok(&*job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::job::Geolocation;

    fn ctx() -> TransitionContext {
        TransitionContext::by("tech-7")
    }

    fn job_at(status: JobStatus) -> Job {
        let mut job = Job::new("job-1");
        job.status = status;
        job
    }

    #[test]
    fn table_is_well_formed() {
        for status in JobStatus::ALL {
            let edges = status.allowed_transitions();
            assert!(!edges.contains(&status), "{status} has a self-loop");
            if matches!(status, JobStatus::Closed | JobStatus::Cancelled) {
                assert!(edges.is_empty(), "{status} must have no edges");
            } else {
                assert!(!edges.is_empty(), "{status} has no outgoing edge");
            }
            for target in edges {
                assert!(JobStatus::ALL.contains(target));
            }
        }
    }

    #[test]
    fn every_state_but_entry_points_is_reachable() {
        for status in JobStatus::ALL {
            if matches!(status, JobStatus::Quote | JobStatus::CallbackNeeded) {
                continue;
            }
            let reachable = JobStatus::ALL
                .iter()
                .any(|from| from.can_transition_to(status));
            assert!(reachable, "{status} is unreachable");
        }
    }

    #[test]
    fn valid_pairs_apply_and_record_once() {
        for from in JobStatus::ALL {
            for &to in from.allowed_transitions() {
                let mut job = job_at(from);
                StateMachine::request_transition(&mut job, to, ctx()).unwrap();
                assert_eq!(job.status, to);
                assert_eq!(job.status_history.len(), 1);
                assert_eq!(job.status_history[0].from_status, from);
                assert_eq!(job.status_history[0].to_status, to);
            }
        }
    }

    #[test]
    fn invalid_pairs_leave_job_unchanged() {
        for from in JobStatus::ALL {
            for to in JobStatus::ALL {
                if from.can_transition_to(to) {
                    continue;
                }
                let mut job = job_at(from);
                let before = job.clone();
                let err = StateMachine::request_transition(&mut job, to, ctx()).unwrap_err();
                assert_eq!(err.from, from);
                assert_eq!(err.to, to);
                assert_eq!(err.allowed, from.allowed_transitions());
                assert_eq!(job, before);
            }
        }
    }

    #[test]
    fn closed_and_cancelled_reject_everything() {
        for from in [JobStatus::Closed, JobStatus::Cancelled] {
            for to in JobStatus::ALL {
                let mut job = job_at(from);
                assert!(StateMachine::request_transition(&mut job, to, ctx()).is_err());
            }
        }
    }

    #[test]
    fn quote_to_paid_is_rejected_after_approval() {
        let mut job = Job::new("job-42");
        StateMachine::request_transition(&mut job, JobStatus::Approved, ctx()).unwrap();
        assert_eq!(job.status, JobStatus::Approved);

        let err = StateMachine::request_transition(&mut job, JobStatus::Paid, ctx()).unwrap_err();
        assert_eq!(err.from, JobStatus::Approved);
        assert_eq!(job.status, JobStatus::Approved);
        assert_eq!(job.status_history.len(), 1);
    }

    #[test]
    fn context_is_recorded_as_given() {
        let mut job = job_at(JobStatus::Scheduled);
        let ctx = TransitionContext {
            actor: "dispatcher".into(),
            reason: Some("customer rescheduled".into()),
            geolocation: Some(Geolocation {
                latitude: 51.5,
                longitude: -0.12,
                accuracy_m: Some(8.0),
            }),
        };
        StateMachine::request_transition(&mut job, JobStatus::OnHold, ctx).unwrap();

        let record = &job.status_history[0];
        assert_eq!(record.changed_by, "dispatcher");
        assert_eq!(record.reason.as_deref(), Some("customer rescheduled"));
        assert_eq!(record.geolocation.as_ref().unwrap().latitude, 51.5);
    }

    #[test]
    fn full_billing_path() {
        let mut job = Job::new("job-9");
        let path = [
            JobStatus::Approved,
            JobStatus::Scheduled,
            JobStatus::InTransit,
            JobStatus::InProgress,
            JobStatus::RequiresParts,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Invoiced,
            JobStatus::Paid,
            JobStatus::Closed,
        ];
        for status in path {
            StateMachine::request_transition(&mut job, status, ctx()).unwrap();
        }
        assert_eq!(job.status, JobStatus::Closed);
        assert_eq!(job.status_history.len(), path.len());
    }

    #[test]
    fn error_message_lists_allowed_set() {
        let mut job = Job::new("job-1");
        let err = StateMachine::request_transition(&mut job, JobStatus::Paid, ctx()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot move job from quote to paid; allowed: approved, cancelled"
        );

        let mut job = job_at(JobStatus::Cancelled);
        let err =
            StateMachine::request_transition(&mut job, JobStatus::Quote, ctx()).unwrap_err();
        assert!(err.to_string().ends_with("none (terminal)"));
    }

    #[test]
    fn status_parses_and_displays_snake_case() {
        for status in JobStatus::ALL {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!("in-progress".parse::<JobStatus>().unwrap(), JobStatus::InProgress);
        assert!("done".parse::<JobStatus>().is_err());

        let json = serde_json::to_string(&JobStatus::CallbackNeeded).unwrap();
        assert_eq!(json, r#""callback_needed""#);
    }

    #[test]
    fn follow_ups() {
        assert_eq!(
            JobStatus::Completed.follow_up(),
            Some(FollowUp::CaptureSignature)
        );
        assert_eq!(JobStatus::Invoiced.follow_up(), Some(FollowUp::GenerateInvoice));
        assert_eq!(JobStatus::Quote.follow_up(), None);
    }
}
