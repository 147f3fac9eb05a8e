//! Job model for background command execution.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    DeadLetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl JobPriority {
    /// Convert to integer for ordering (lower = higher priority)
    pub fn as_i16(&self) -> i16 {
        match self {
            JobPriority::Critical => 0,
            JobPriority::High => 1,
            JobPriority::Normal => 2,
            JobPriority::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "error_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
    /// Job was interrupted by graceful shutdown - will retry
    Shutdown,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable | ErrorKind::Shutdown)
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Exponential backoff applied between attempts of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay_secs: i64,
    pub max_delay_secs: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_secs: 1,
            max_delay_secs: 3600,
        }
    }
}

impl RetryPolicy {
    /// No delay between attempts. Used by tests that drain the queue in-process.
    pub fn immediate() -> Self {
        Self {
            base_delay_secs: 0,
            max_delay_secs: 0,
        }
    }

    /// Delay before the retry following `retry_count` previous retries.
    pub fn delay_for(&self, retry_count: i32) -> chrono::Duration {
        let exp = 2i64.saturating_pow(retry_count.clamp(0, 30) as u32);
        let secs = self.base_delay_secs.saturating_mul(exp).min(self.max_delay_secs);
        chrono::Duration::seconds(secs)
    }
}

// ============================================================================
// Job Model
// ============================================================================

pub(crate) const JOB_COLUMNS: &str = r#"
    id, job_type, args, status, priority, max_retries, retry_count, attempt,
    next_run_at, last_run_at, lease_duration_ms, lease_expires_at, worker_id,
    error_message, error_kind, dead_lettered_at, dead_letter_reason, replay_count,
    resolved_at, root_job_id, idempotency_key, created_at, updated_at
"#;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::now_v7())]
    pub id: Uuid,

    pub job_type: String,
    pub args: serde_json::Value,

    #[builder(default)]
    pub status: JobStatus,
    #[builder(default)]
    pub priority: JobPriority,

    // Retry state
    #[builder(default = 3)]
    pub max_retries: i32,
    #[builder(default = 0)]
    pub retry_count: i32,
    #[builder(default = 1)]
    pub attempt: i32,

    // Scheduling
    #[builder(default, setter(strip_option))]
    pub next_run_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub last_run_at: Option<DateTime<Utc>>,

    // Lease management
    #[builder(default = 60_000)] // 1 minute
    pub lease_duration_ms: i64,
    #[builder(default, setter(strip_option))]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub worker_id: Option<String>,

    // Error tracking
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,
    #[builder(default, setter(strip_option))]
    pub error_kind: Option<ErrorKind>,

    // Dead letter workflow
    #[builder(default, setter(strip_option))]
    pub dead_lettered_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub dead_letter_reason: Option<String>,
    #[builder(default = 0)]
    pub replay_count: i32,
    #[builder(default, setter(strip_option))]
    pub resolved_at: Option<DateTime<Utc>>,

    // Retry chain tracing
    #[builder(default, setter(strip_option))]
    pub root_job_id: Option<Uuid>,

    // Command-level idempotency
    #[builder(default, setter(strip_option))]
    pub idempotency_key: Option<String>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a job for a serialized command.
    pub fn for_command(
        job_type: &str,
        args: serde_json::Value,
        spec: &JobSpec,
        lease_duration_ms: i64,
    ) -> Self {
        let mut job = Self::builder()
            .job_type(job_type)
            .args(args)
            .priority(spec.priority)
            .max_retries(spec.max_retries)
            .lease_duration_ms(lease_duration_ms)
            .build();
        job.next_run_at = spec.run_at;
        job.idempotency_key = spec.idempotency_key.clone();
        job
    }

    /// Check if the job is ready to run
    pub fn is_ready(&self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }

        match self.next_run_at {
            None => true,
            Some(next_run) => next_run <= Utc::now(),
        }
    }

    /// Whether a running job's lease has lapsed and another worker may take it.
    pub fn lease_expired(&self) -> bool {
        self.status == JobStatus::Running
            && self.lease_expires_at.is_some_and(|expires| expires < Utc::now())
    }

    /// Whether a failure of `kind` leaves room for another attempt.
    pub fn can_retry(&self, kind: ErrorKind) -> bool {
        kind.should_retry() && self.retry_count < self.max_retries
    }

    /// Create a retry job from a failed job
    pub fn create_retry(&self, scheduled_for: DateTime<Utc>) -> Self {
        let mut retry = Self::builder()
            .job_type(self.job_type.clone())
            .args(self.args.clone())
            .priority(self.priority)
            .max_retries(self.max_retries)
            .retry_count(self.retry_count + 1)
            .attempt(self.attempt + 1)
            .lease_duration_ms(self.lease_duration_ms)
            .replay_count(self.replay_count)
            .next_run_at(scheduled_for)
            .build();
        retry.root_job_id = self.root_job_id.or(Some(self.id));
        retry.idempotency_key = self.idempotency_key.clone();
        retry
    }

    /// Create a fresh attempt chain from a dead-lettered job.
    pub fn create_replay(&self) -> Self {
        let mut replay = Self::builder()
            .job_type(self.job_type.clone())
            .args(self.args.clone())
            .priority(self.priority)
            .max_retries(self.max_retries)
            .lease_duration_ms(self.lease_duration_ms)
            .replay_count(self.replay_count + 1)
            .build();
        replay.root_job_id = self.root_job_id.or(Some(self.id));
        replay
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_one(pool)
            .await?;

        Ok(job)
    }

    /// Find a pending/running job carrying the given idempotency key.
    pub async fn find_active_by_idempotency_key(key: &str, pool: &PgPool) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE idempotency_key = $1
              AND status IN ('pending', 'running')
            LIMIT 1
            "#
        ))
        .bind(key)
        .fetch_optional(pool)
        .await?;

        Ok(job)
    }

    /// Find the most recent dead-lettered jobs that nobody has resolved yet.
    pub async fn find_dead_letters(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE status = 'dead_letter'
              AND resolved_at IS NULL
            ORDER BY dead_lettered_at DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(jobs)
    }

    /// Claim jobs atomically using FOR UPDATE SKIP LOCKED.
    /// Also recovers stale jobs with expired leases.
    pub async fn claim_jobs(limit: i64, worker_id: &str, pool: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE
                    (status = 'pending' AND (next_run_at IS NULL OR next_run_at <= NOW()))
                    OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY priority, COALESCE(next_run_at, created_at)
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                status = 'running',
                last_run_at = NOW(),
                lease_expires_at = NOW() + (lease_duration_ms || ' milliseconds')::INTERVAL,
                worker_id = $2,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(limit)
        .bind(worker_id)
        .fetch_all(pool)
        .await?;

        Ok(jobs)
    }

    /// Insert the job, or return `None` when a pending/running job already
    /// holds its idempotency key.
    pub async fn insert(&self, pool: &PgPool) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO jobs (
                id, job_type, args, status, priority, max_retries, retry_count, attempt,
                next_run_at, last_run_at, lease_duration_ms, lease_expires_at, worker_id,
                error_message, error_kind, dead_lettered_at, dead_letter_reason, replay_count,
                resolved_at, root_job_id, idempotency_key, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8,
                $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23
            )
            ON CONFLICT (idempotency_key)
                WHERE idempotency_key IS NOT NULL AND status IN ('pending', 'running')
                DO NOTHING
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(&self.job_type)
        .bind(&self.args)
        .bind(self.status)
        .bind(self.priority)
        .bind(self.max_retries)
        .bind(self.retry_count)
        .bind(self.attempt)
        .bind(self.next_run_at)
        .bind(self.last_run_at)
        .bind(self.lease_duration_ms)
        .bind(self.lease_expires_at)
        .bind(&self.worker_id)
        .bind(&self.error_message)
        .bind(self.error_kind)
        .bind(self.dead_lettered_at)
        .bind(&self.dead_letter_reason)
        .bind(self.replay_count)
        .bind(self.resolved_at)
        .bind(self.root_job_id)
        .bind(&self.idempotency_key)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_optional(pool)
        .await?;

        Ok(job)
    }
}

// ============================================================================
// Submission spec
// ============================================================================

/// Per-submission options derived from a command's `CommandMeta`.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct JobSpec {
    #[builder(default)]
    pub priority: JobPriority,
    #[builder(default = 3)]
    pub max_retries: i32,
    #[builder(default)]
    pub idempotency_key: Option<String>,
    #[builder(default)]
    pub run_at: Option<DateTime<Utc>>,
}

impl Default for JobSpec {
    fn default() -> Self {
        Self::builder().build()
    }
}
