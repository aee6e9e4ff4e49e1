//! Job command handlers
//!
//! Looks up and waits on queued ledger mutations.

use std::time::Duration;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use tally_client::GatewayClient;
use tally_core::domain::job::{Job, JobState};
use uuid::Uuid;

use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Get job details
    Get {
        /// Job ID returned when the mutation was accepted
        id: Uuid,
    },
    /// Poll a job until it succeeds or fails
    Wait {
        id: Uuid,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        JobCommands::Get { id } => {
            let job = client.get_job(id).await?;
            print_job_details(&job);
            Ok(())
        }
        JobCommands::Wait {
            id,
            interval_ms,
            timeout_secs,
        } => {
            wait_and_print(
                &client,
                id,
                Duration::from_millis(interval_ms),
                Duration::from_secs(timeout_secs),
            )
            .await
        }
    }
}

/// Wait for a job to finish, print it, and fail if the job failed
pub(crate) async fn wait_and_print(
    client: &GatewayClient,
    id: Uuid,
    interval: Duration,
    timeout: Duration,
) -> Result<()> {
    println!("{}", format!("Waiting for job {}...", id).dimmed());

    let job = client.wait_for_job(id, interval, timeout).await?;
    print_job_details(&job);

    if job.state == JobState::Failed {
        anyhow::bail!("Job {} failed", job.id);
    }

    Ok(())
}

/// Print detailed job information
pub(crate) fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Operation:   {}", job.operation);
    println!("  Record:      {}", job.record_key);
    println!("  State:       {}", colorize_state(job.state));
    println!("  Attempts:    {}/{}", job.attempts, job.max_attempts);
    println!("  Enqueued:    {}", job.enqueued_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:     {}", job.updated_at.format("%Y-%m-%d %H:%M:%S"));

    if job.state == JobState::Queued && job.attempts > 0 {
        println!(
            "  Retry after: {}",
            job.available_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    if let Some(worker) = &job.worker_id {
        println!("  Worker:      {}", worker.dimmed());
    }

    if let Some(result) = &job.result {
        println!("\n{}", "Result:".bold());
        match serde_json::to_string_pretty(result) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{:?}", result),
        }
    }

    if let Some(error) = &job.last_error {
        println!("\n{}", format!("Error ({:?}):", error.kind).bold());
        println!("{}", error.message.red());
    }
}

/// Colorize job state for display
fn colorize_state(state: JobState) -> ColoredString {
    let label = state.as_str();
    match state {
        JobState::Queued => label.yellow(),
        JobState::InFlight => label.cyan(),
        JobState::Succeeded => label.green(),
        JobState::Failed => label.red(),
    }
}
