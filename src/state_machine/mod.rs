mod job;
mod state;

pub use job::{Geolocation, Job, StatusChange, TransitionContext};
pub use state::{FollowUp, InvalidTransition, JobStatus, StateMachine, UnknownStatus};
