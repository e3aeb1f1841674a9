//! Field-service client core: the job status workflow and the offline
//! point-of-sale queue, plus the backend client both are used with.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod offline;
pub mod state_machine;
pub mod ui;

pub use error::FieldopsError;
