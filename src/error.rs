use thiserror::Error;

use crate::api::ApiError;
use crate::offline::QueueError;
use crate::state_machine::{InvalidTransition, UnknownStatus};

#[derive(Debug, Error)]
pub enum FieldopsError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing setting `{0}`; set it in fieldops.toml or the environment")]
    MissingSetting(&'static str),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatus),

    #[error("Offline queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
