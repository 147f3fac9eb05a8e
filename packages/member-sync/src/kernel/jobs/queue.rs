//! Job queue abstraction and its PostgreSQL-backed implementation.
//!
//! Every hand-off between pipeline stages is a job submission: the submitter
//! returns as soon as the job is durably stored, and a worker later invokes
//! the handler registered for the job type.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::job::{ErrorKind, Job, JobPriority, JobSpec, RetryPolicy};

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Command was enqueued, returns new job ID
    Created(Uuid),
    /// Command already exists (idempotency hit), returns existing job ID
    Duplicate(Uuid),
}

impl EnqueueResult {
    /// Get the job ID regardless of whether it was created or duplicate
    pub fn job_id(&self) -> Uuid {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    /// Returns true if this was a newly created job
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// A new attempt is scheduled.
    Retrying { attempt: i32, retry_at: DateTime<Utc> },
    /// No further attempts; the job waits in the dead letter queue for an operator.
    DeadLettered { attempts: i32, reason: String },
}

/// A claimed job ready for execution.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    /// The job ID
    pub id: Uuid,
    /// The raw job record
    pub job: Job,
}

impl ClaimedJob {
    /// Deserialize the command payload.
    pub fn deserialize<C: DeserializeOwned>(&self) -> Result<C> {
        serde_json::from_value(self.job.args.clone())
            .map_err(|e| anyhow!("failed to deserialize {}: {}", self.job.job_type, e))
    }

    /// Get the command type (job_type)
    pub fn command_type(&self) -> &str {
        &self.job.job_type
    }
}

impl From<Job> for ClaimedJob {
    fn from(job: Job) -> Self {
        Self { id: job.id, job }
    }
}

/// Metadata for command serialization.
///
/// Commands implement this trait to provide their job type name and
/// submission options.
pub trait CommandMeta {
    /// The command type name (used as job_type).
    fn command_type(&self) -> &'static str;

    /// Optional idempotency key.
    ///
    /// If provided, ensures only one pending/running job exists with this key.
    fn idempotency_key(&self) -> Option<String> {
        None
    }

    /// Optional priority override.
    fn priority(&self) -> JobPriority {
        JobPriority::Normal
    }

    /// Maximum retries for this command.
    fn max_retries(&self) -> i32 {
        3
    }

    fn job_spec(&self) -> JobSpec {
        JobSpec::builder()
            .priority(self.priority())
            .max_retries(self.max_retries())
            .idempotency_key(self.idempotency_key())
            .build()
    }
}

/// Durable, at-least-once job dispatch.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Store a serialized command for execution.
    ///
    /// If the spec carries an idempotency key and a matching pending/running
    /// job exists, returns `EnqueueResult::Duplicate` with the existing job ID.
    async fn enqueue_payload(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        spec: JobSpec,
    ) -> Result<EnqueueResult>;

    /// Claim up to `limit` ready jobs for processing.
    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>>;

    /// Mark a job as successfully completed.
    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()>;

    /// Mark a job as failed with an error.
    ///
    /// If retries remain and the error is retryable, a new attempt is
    /// scheduled. Otherwise the job is moved to the dead letter queue.
    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<FailureOutcome>;

    /// Extend the lease for a running job (heartbeat).
    async fn heartbeat(&self, job_id: Uuid) -> Result<()>;

    /// Unresolved dead-lettered jobs, newest first.
    async fn dead_letters(&self, limit: i64) -> Result<Vec<Job>>;

    /// Re-submit a dead-lettered job with a fresh retry budget.
    async fn replay(&self, job_id: Uuid) -> Result<Uuid>;
}

/// Typed submission on top of [`JobQueue`].
#[async_trait]
pub trait JobQueueExt {
    /// Serialize a command and submit it under its `command_type()`.
    async fn enqueue<C>(&self, command: C) -> Result<EnqueueResult>
    where
        C: Serialize + CommandMeta + Send + Sync + 'static;
}

#[async_trait]
impl<Q: JobQueue + ?Sized> JobQueueExt for Q {
    async fn enqueue<C>(&self, command: C) -> Result<EnqueueResult>
    where
        C: Serialize + CommandMeta + Send + Sync + 'static,
    {
        let job_type = command.command_type();
        let payload = serde_json::to_value(&command)
            .with_context(|| format!("failed to serialize {}", job_type))?;
        self.enqueue_payload(job_type, payload, command.job_spec())
            .await
    }
}

/// PostgreSQL-backed job queue implementation.
pub struct PostgresJobQueue {
    pool: PgPool,
    default_lease_ms: i64,
    retry_policy: RetryPolicy,
    max_retries: Option<i32>,
}

impl PostgresJobQueue {
    /// Create a new PostgreSQL job queue.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            default_lease_ms: 60_000, // 1 minute
            retry_policy: RetryPolicy::default(),
            max_retries: None,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Apply one retry budget to every submission, overriding the command's own.
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue_payload(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        mut spec: JobSpec,
    ) -> Result<EnqueueResult> {
        if let Some(max_retries) = self.max_retries {
            spec.max_retries = max_retries;
        }

        // Check idempotency first
        if let Some(key) = &spec.idempotency_key {
            if let Some(existing) = Job::find_active_by_idempotency_key(key, &self.pool).await? {
                debug!(
                    job_id = %existing.id,
                    idempotency_key = %key,
                    "found existing job with idempotency key"
                );
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let job = Job::for_command(job_type, payload, &spec, self.default_lease_ms);
        let Some(inserted) = job.insert(&self.pool).await? else {
            // Lost a race with a concurrent submission of the same key.
            let key = spec.idempotency_key.as_deref().unwrap_or_default();
            let existing = Job::find_active_by_idempotency_key(key, &self.pool)
                .await?
                .ok_or_else(|| anyhow!("idempotency key {key} conflicted but no active job holds it"))?;
            debug!(job_id = %existing.id, idempotency_key = %key, "concurrent submission deduplicated");
            return Ok(EnqueueResult::Duplicate(existing.id));
        };

        debug!(job_id = %inserted.id, job_type = %job_type, "job enqueued");

        Ok(EnqueueResult::Created(inserted.id))
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>> {
        let jobs = Job::claim_jobs(limit, worker_id, &self.pool).await?;
        Ok(jobs.into_iter().map(ClaimedJob::from).collect())
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<FailureOutcome> {
        let job = Job::find_by_id(job_id, &self.pool).await?;

        if job.can_retry(kind) {
            let retry_at = Utc::now() + self.retry_policy.delay_for(job.retry_count);
            let retry_job = job.create_retry(retry_at);

            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed',
                    error_message = $1,
                    error_kind = $2,
                    lease_expires_at = NULL,
                    updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(error)
            .bind(kind)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

            // Insert after the original leaves 'running'; the idempotency index allows one active holder.
            let attempt = retry_job.attempt;
            sqlx::query(
                r#"
                INSERT INTO jobs (
                    id, job_type, args, status, priority, max_retries, retry_count, attempt,
                    next_run_at, lease_duration_ms, replay_count, root_job_id, idempotency_key,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
                "#,
            )
            .bind(retry_job.id)
            .bind(&retry_job.job_type)
            .bind(&retry_job.args)
            .bind(retry_job.priority)
            .bind(retry_job.max_retries)
            .bind(retry_job.retry_count)
            .bind(retry_job.attempt)
            .bind(retry_job.next_run_at)
            .bind(retry_job.lease_duration_ms)
            .bind(retry_job.replay_count)
            .bind(retry_job.root_job_id)
            .bind(&retry_job.idempotency_key)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            return Ok(FailureOutcome::Retrying { attempt, retry_at });
        }

        let reason = if kind.should_retry() {
            "max retries exceeded"
        } else {
            "non-retryable error"
        };

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'dead_letter',
                error_message = $1,
                error_kind = $2,
                dead_lettered_at = NOW(),
                dead_letter_reason = $3,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(error)
        .bind(kind)
        .bind(reason)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(FailureOutcome::DeadLettered {
            attempts: job.attempt,
            reason: reason.to_string(),
        })
    }

    async fn heartbeat(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET lease_expires_at = NOW() + (lease_duration_ms || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn dead_letters(&self, limit: i64) -> Result<Vec<Job>> {
        Job::find_dead_letters(limit, &self.pool).await
    }

    async fn replay(&self, job_id: Uuid) -> Result<Uuid> {
        let job = Job::find_by_id(job_id, &self.pool).await?;
        if job.status != super::JobStatus::DeadLetter {
            return Err(anyhow!("job {} is not dead-lettered", job_id));
        }

        let replay = job.create_replay();

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE jobs SET resolved_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, job_type, args, status, priority, max_retries, retry_count, attempt,
                lease_duration_ms, replay_count, root_job_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, 'pending', $4, $5, 0, 1, $6, $7, $8, NOW(), NOW())
            "#,
        )
        .bind(replay.id)
        .bind(&replay.job_type)
        .bind(&replay.args)
        .bind(replay.priority)
        .bind(replay.max_retries)
        .bind(replay.lease_duration_ms)
        .bind(replay.replay_count)
        .bind(replay.root_job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(job_id = %job_id, replay_id = %replay.id, "replayed dead-lettered job");

        Ok(replay.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct PingJob {
        target: String,
    }

    impl CommandMeta for PingJob {
        fn command_type(&self) -> &'static str {
            "ping"
        }

        fn idempotency_key(&self) -> Option<String> {
            Some(format!("ping:{}", self.target))
        }

        fn max_retries(&self) -> i32 {
            5
        }
    }

    #[test]
    fn test_enqueue_result_helpers() {
        let id = Uuid::new_v4();
        let created = EnqueueResult::Created(id);
        assert!(created.is_created());
        assert_eq!(created.job_id(), id);

        let duplicate = EnqueueResult::Duplicate(id);
        assert!(!duplicate.is_created());
        assert_eq!(duplicate.job_id(), id);
    }

    #[test]
    fn job_spec_follows_command_meta() {
        let spec = PingJob { target: "a".into() }.job_spec();
        assert_eq!(spec.max_retries, 5);
        assert_eq!(spec.idempotency_key.as_deref(), Some("ping:a"));
        assert_eq!(spec.priority, JobPriority::Normal);
        assert!(spec.run_at.is_none());
    }

    #[test]
    fn claimed_job_deserializes_payload() {
        let job = Job::for_command(
            "ping",
            serde_json::json!({"target": "b"}),
            &JobSpec::default(),
            60_000,
        );
        let claimed = ClaimedJob::from(job);
        let ping: PingJob = claimed.deserialize().unwrap();
        assert_eq!(ping.target, "b");
        assert_eq!(claimed.command_type(), "ping");
    }

    #[test]
    fn claimed_job_rejects_bad_payload() {
        let job = Job::for_command("ping", serde_json::json!({"nope": 1}), &JobSpec::default(), 60_000);
        let err = ClaimedJob::from(job).deserialize::<PingJob>().unwrap_err();
        assert!(err.to_string().contains("failed to deserialize ping"));
    }
}
