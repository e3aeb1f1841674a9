use std::cell::Cell;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Value, json};

use fieldops::cli::{Cli, Command, JobCommand, QueueCommand, TransitionArgs};
use fieldops::config::FieldopsConfig;
use fieldops::logging::init_logging;
use fieldops::offline::{
    FileStore, MemoryStore, OfflineSaleQueue, QueueOptions, QueuedSale, SaleSubmitter, TenantKey,
};
use fieldops::state_machine::{Geolocation, Job, JobStatus, StateMachine, TransitionContext};
use fieldops::ui::{self, DrainProgress, Tracked};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FieldopsConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Command::Job(command) => run_job(&config, command).await,
        Command::Queue(command) => run_queue(&config, command).await,
        Command::Demo => run_demo().await,
    }
}

async fn run_job(config: &FieldopsConfig, command: JobCommand) -> Result<()> {
    match command {
        JobCommand::Edges { status } => {
            let edges = status.allowed_transitions();
            if edges.is_empty() {
                println!("{status}: no outgoing transitions");
            }
            for target in edges {
                println!("{status} -> {target}");
            }
            Ok(())
        }
        JobCommand::Show { id } => {
            let job = config.api_client()?.get_job(&id).await?;
            ui::print_job(&job);
            Ok(())
        }
        JobCommand::Transition(args) => transition(config, args).await,
    }
}

async fn transition(config: &FieldopsConfig, args: TransitionArgs) -> Result<()> {
    let client = config.api_client()?;
    let mut job = client.get_job(&args.id).await?;

    let mut ctx = TransitionContext::by(args.actor);
    ctx.reason = args.reason;
    if let (Some(latitude), Some(longitude)) = (args.latitude, args.longitude) {
        ctx = ctx.at(Geolocation {
            latitude,
            longitude,
            accuracy_m: None,
        });
    }

    StateMachine::request_transition(&mut job, args.status, ctx)?;
    client
        .update_job_status(&job)
        .await
        .with_context(|| format!("transition applied locally but not saved for job {}", job.id))?;

    ui::print_job(&job);
    if let Some(follow_up) = job.status.follow_up() {
        println!("  follow-up: {follow_up}");
    }
    Ok(())
}

async fn run_queue(config: &FieldopsConfig, command: QueueCommand) -> Result<()> {
    let store = FileStore::open(&config.storage_dir)
        .with_context(|| format!("cannot open {}", config.storage_dir.display()))?;
    let mut queue = OfflineSaleQueue::open(store, config.tenant_key()?, config.queue_options())?;

    match command {
        QueueCommand::Add { json, file } => {
            let text = match (json, file) {
                (Some(json), _) => json,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?,
                (None, None) => bail!("provide sale JSON or --file"),
            };
            let sale: Value = serde_json::from_str(&text).context("sale is not valid JSON")?;
            let queued = queue.enqueue(&sale)?;
            println!("Queued {} ({} in queue)", queued.id, queue.len()?);
        }
        QueueCommand::List => ui::print_sales(&queue.dequeue_all()?),
        QueueCommand::Failed => ui::print_sales(&queue.failed()?),
        QueueCommand::Retry { id } => {
            queue.retry_failed(&id)?;
            println!("{id} is pending again");
        }
        QueueCommand::Discard { id } => {
            let sale = queue.discard(&id)?;
            println!("Discarded {}", sale.id);
        }
        QueueCommand::Drain => {
            let client = config.api_client()?;
            let pending = queue.pending()?.len();
            let progress = DrainProgress::start(pending);
            let report = queue
                .drain_and_replay(&Tracked {
                    inner: &client,
                    progress: &progress,
                })
                .await?;
            progress.complete(&report);
        }
    }
    Ok(())
}

/// Pretends to be the sales endpoint; rejects everything while offline.
struct DemoBackend {
    online: Cell<bool>,
}

impl SaleSubmitter for DemoBackend {
    type Error = String;

    async fn submit_sale(&self, _sale: &QueuedSale) -> Result<(), String> {
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        if self.online.get() {
            Ok(())
        } else {
            Err("network unreachable".to_string())
        }
    }
}

async fn run_demo() -> Result<()> {
    println!("── Job workflow ──");
    let mut job = Job::new("DEMO-1");
    let path = [
        JobStatus::Approved,
        JobStatus::Scheduled,
        JobStatus::InTransit,
        JobStatus::InProgress,
        JobStatus::Completed,
    ];
    for status in path {
        StateMachine::request_transition(&mut job, status, TransitionContext::by("demo"))?;
    }
    if let Err(err) =
        StateMachine::request_transition(&mut job, JobStatus::Closed, TransitionContext::by("demo"))
    {
        println!("rejected: {err}");
    }
    ui::print_job(&job);

    println!();
    println!("── Offline queue ──");
    let key = TenantKey::new("demo-tenant")?;
    let mut queue = OfflineSaleQueue::open(MemoryStore::new(), key, QueueOptions::default())?;
    for total in [9.99, 24.5, 3.25] {
        queue.enqueue(&json!({"total": total, "paymentMethod": "cash"}))?;
    }
    ui::print_sales(&queue.dequeue_all()?);

    let backend = DemoBackend {
        online: Cell::new(false),
    };
    for online in [false, true] {
        backend.online.set(online);
        println!();
        println!("network {}", if online { "up" } else { "down" });
        let progress = DrainProgress::start(queue.pending()?.len());
        let report = queue
            .drain_and_replay(&Tracked {
                inner: &backend,
                progress: &progress,
            })
            .await?;
        progress.complete(&report);
    }
    Ok(())
}
