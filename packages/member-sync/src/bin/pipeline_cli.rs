//! Operator CLI for the member sync pipeline
//!
//! Inspects and replays dead-lettered jobs and submits status changes.
//! Output is one JSON document per command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use member_sync::common::MemberId;
use member_sync::config::Config;
use member_sync::domains::member::activities;
use member_sync::domains::member::models::MemberStatus;
use member_sync::kernel::jobs::{Job, JobQueue, PostgresJobQueue};
use member_sync::kernel::ServerDeps;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pipeline_cli")]
#[command(about = "Member sync pipeline operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List unresolved dead-lettered jobs, newest first
    DeadLetters {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Re-submit a dead-lettered job with a fresh retry budget
    Replay { job_id: Uuid },

    /// Mark every member listed in a file (one id per line) as bulk removed
    BulkRemove { file: PathBuf },

    /// Change one member's status
    SetStatus {
        member_id: String,
        status: MemberStatus,
        /// Email the member about the removal (inactive only)
        #[arg(long)]
        violation_email: bool,
    },
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize)]
struct DeadLetterInfo {
    id: Uuid,
    job_type: String,
    attempt: i32,
    reason: Option<String>,
    error: Option<String>,
    dead_lettered_at: Option<DateTime<Utc>>,
    args: serde_json::Value,
}

impl From<Job> for DeadLetterInfo {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            attempt: job.attempt,
            reason: job.dead_letter_reason,
            error: job.error_message,
            dead_lettered_at: job.dead_lettered_at,
            args: job.args,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Response {
    DeadLetters { dead_letters: Vec<DeadLetterInfo> },
    Replayed { replayed: Uuid, new_job_id: Uuid },
    Submitted { members: usize, jobs: usize },
    StatusChange { job_id: Uuid, duplicate: bool },
}

fn output(resp: &Response) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(resp)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let queue: Arc<dyn JobQueue> =
        Arc::new(PostgresJobQueue::new(pool.clone()).with_max_retries(config.job_max_retries));

    let response = match cli.command {
        Commands::DeadLetters { limit } => {
            let dead_letters = queue
                .dead_letters(limit)
                .await?
                .into_iter()
                .map(DeadLetterInfo::from)
                .collect();
            Response::DeadLetters { dead_letters }
        }
        Commands::Replay { job_id } => {
            let new_job_id = queue.replay(job_id).await?;
            Response::Replayed {
                replayed: job_id,
                new_job_id,
            }
        }
        Commands::BulkRemove { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let deps = ServerDeps::from_config(&config, pool, queue);
            let summary = activities::bulk_remove(activities::parse_member_ids(&text), &deps).await?;
            Response::Submitted {
                members: summary.members,
                jobs: summary.chunks,
            }
        }
        Commands::SetStatus {
            member_id,
            status,
            violation_email,
        } => {
            let deps = ServerDeps::from_config(&config, pool, queue);
            let result =
                activities::change_member_status(MemberId::new(member_id), status, violation_email, &deps)
                    .await?;
            Response::StatusChange {
                job_id: result.job_id(),
                duplicate: !result.is_created(),
            }
        }
    };

    output(&response)
}
