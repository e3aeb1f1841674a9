//! Command-line interface built on clap.
//!
//! [`Cli`] carries the `job`, `queue` and `demo` subcommands plus the global
//! `--config` and `--verbose` flags.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::state_machine::JobStatus;

/// fieldops: job workflow and offline point-of-sale queue.
#[derive(Debug, Parser)]
#[command(name = "fieldops", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (default: ./fieldops.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging for fieldops.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect and move jobs through their workflow.
    #[command(subcommand)]
    Job(JobCommand),

    /// Manage sales captured while offline.
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Walk a job and an offline queue through their lifecycles locally.
    Demo,
}

#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Show a job, its history and the statuses it can move to.
    Show { id: String },

    /// Request a status transition and save it to the backend.
    Transition(TransitionArgs),

    /// List the statuses reachable from a status.
    Edges { status: JobStatus },
}

#[derive(Debug, Args)]
pub struct TransitionArgs {
    pub id: String,

    /// Target status, e.g. `in_progress`.
    pub status: JobStatus,

    /// Who is making the change.
    #[arg(long)]
    pub actor: String,

    #[arg(long)]
    pub reason: Option<String>,

    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Queue a sale given as JSON, inline or from a file.
    Add {
        /// Sale JSON, e.g. '{"total": 9.99, "paymentMethod": "cash"}'.
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        json: Option<String>,

        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// List queued sales.
    List,

    /// Replay pending sales to the backend, oldest first.
    Drain,

    /// List sales set aside after repeated replay failures.
    Failed,

    /// Return a failed sale to the pending queue.
    Retry { id: String },

    /// Remove a sale from the queue permanently.
    Discard { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_job_transition() {
        let cli = Cli::parse_from([
            "fieldops",
            "job",
            "transition",
            "J-100",
            "in_progress",
            "--actor",
            "tech-7",
            "--latitude",
            "-33.86",
            "--longitude",
            "151.2",
        ]);
        match cli.command {
            Command::Job(JobCommand::Transition(args)) => {
                assert_eq!(args.id, "J-100");
                assert_eq!(args.status, JobStatus::InProgress);
                assert_eq!(args.actor, "tech-7");
                assert_eq!(args.latitude, Some(-33.86));
                assert!(args.reason.is_none());
            }
            _ => panic!("expected job transition"),
        }
    }

    #[test]
    fn cli_rejects_unknown_status() {
        let result = Cli::try_parse_from(["fieldops", "job", "edges", "finished"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_queue_add_and_global_flags() {
        let cli = Cli::parse_from([
            "fieldops",
            "--verbose",
            "--config",
            "pos.toml",
            "queue",
            "add",
            r#"{"total": 9.99}"#,
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("pos.toml")));
        match cli.command {
            Command::Queue(QueueCommand::Add { json, file }) => {
                assert_eq!(json.as_deref(), Some(r#"{"total": 9.99}"#));
                assert!(file.is_none());
            }
            _ => panic!("expected queue add"),
        }
    }

    #[test]
    fn queue_add_requires_input() {
        assert!(Cli::try_parse_from(["fieldops", "queue", "add"]).is_err());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
