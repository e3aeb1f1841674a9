//! Terminal output: colored summaries and a spinner while draining.
//!
//! Uses `indicatif` for the spinner and `console` for styling.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::offline::{DrainReport, QueuedSale, SaleStatus, SaleSubmitter};
use crate::state_machine::{Job, JobStatus};

/// Spinner shown while queued sales are replayed.
///
/// Green for replayed sales, red for sales set aside, yellow for the sale
/// that stopped the drain.
pub struct DrainProgress {
    // Spinner, cleared when the drain finishes.
    pb: ProgressBar,
    // Replayed.
    green: Style,
    // Set aside as failed.
    red: Style,
    // Stopped the drain.
    yellow: Style,
}

impl DrainProgress {
    pub fn start(pending: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Replaying {pending} queued sale(s)"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    fn submitting(&self, sale: &QueuedSale) {
        self.pb.set_message(format!("Submitting {}", sale.id));
    }

    pub fn complete(&self, report: &DrainReport) {
        self.pb.finish_and_clear();
        for id in &report.replayed {
            println!("  {} {id}", self.green.apply_to("✓"));
        }
        for id in &report.poisoned {
            println!("  {} {id} set aside as failed", self.red.apply_to("✗"));
        }
        if let Some(id) = &report.halted_on {
            println!(
                "  {} {id} could not be submitted; stopped with {} sale(s) left",
                self.yellow.apply_to("↻"),
                report.remaining
            );
        } else {
            println!(
                "  {} drain finished, {} sale(s) left",
                self.green.apply_to("●"),
                report.remaining
            );
        }
    }
}

/// Wraps a submitter so each submission updates the spinner.
pub struct Tracked<'a, P> {
    /// The submitter doing the actual work.
    pub inner: &'a P,
    /// Spinner updated before each submission.
    pub progress: &'a DrainProgress,
}

impl<P: SaleSubmitter> SaleSubmitter for Tracked<'_, P> {
    type Error = P::Error;

    async fn submit_sale(&self, sale: &QueuedSale) -> Result<(), P::Error> {
        self.progress.submitting(sale);
        self.inner.submit_sale(sale).await
    }
}

pub fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Paid | JobStatus::Closed => Style::new().green().bold(),
        JobStatus::Cancelled => Style::new().red().bold(),
        JobStatus::OnHold | JobStatus::RequiresParts | JobStatus::CallbackNeeded => {
            Style::new().yellow()
        }
        _ => Style::new().cyan(),
    }
}

pub fn print_job(job: &Job) {
    println!(
        "{} {}",
        Style::new().bold().apply_to(&job.id),
        status_style(job.status).apply_to(job.status)
    );
    for change in &job.status_history {
        let reason = change
            .reason
            .as_deref()
            .map(|r| format!(" ({r})"))
            .unwrap_or_default();
        println!(
            "  {} {} → {} by {}{reason}",
            change.changed_at.format("%Y-%m-%d %H:%M"),
            change.from_status,
            change.to_status,
            change.changed_by
        );
    }
    let next = job.status.allowed_transitions();
    if next.is_empty() {
        println!("  no further transitions");
    } else {
        let names: Vec<_> = next.iter().map(|s| s.as_str()).collect();
        println!("  next: {}", names.join(", "));
    }
}

pub fn print_sales(sales: &[QueuedSale]) {
    if sales.is_empty() {
        println!("No queued sales.");
        return;
    }
    for sale in sales {
        let status = match sale.status {
            SaleStatus::Pending => Style::new().yellow().apply_to(sale.status),
            SaleStatus::Failed => Style::new().red().bold().apply_to(sale.status),
        };
        let error = sale
            .last_error
            .as_deref()
            .map(|e| format!(" last error: {e}"))
            .unwrap_or_default();
        println!(
            "{} {} {} attempts={}{error}",
            sale.id,
            sale.timestamp.format("%Y-%m-%d %H:%M:%S"),
            status,
            sale.attempts
        );
    }
}
