//! Request and response bodies for the backend REST API.

use serde::{Deserialize, Serialize};

use crate::state_machine::{Job, JobStatus, StatusChange};

/// Body of `PATCH /jobs/{id}` after a status transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate<'a> {
    pub status: JobStatus,
    pub status_history: &'a [StatusChange],
}

impl<'a> From<&'a Job> for StatusUpdate<'a> {
    fn from(job: &'a Job) -> Self {
        Self {
            status: job.status,
            status_history: &job.status_history,
        }
    }
}

/// Error body returned by the backend, when it sends one.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(alias = "error")]
    pub message: String,
}
