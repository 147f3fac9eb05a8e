//! Job testing utilities.
//!
//! [`InMemoryJobQueue`] implements the same queue semantics as
//! [`PostgresJobQueue`](super::PostgresJobQueue) without a database, so
//! pipeline tests can submit, inspect and drain jobs in-process.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::job::{ErrorKind, Job, JobSpec, JobStatus, RetryPolicy};
use super::queue::{ClaimedJob, EnqueueResult, FailureOutcome, JobQueue};

pub struct InMemoryJobQueue {
    jobs: Mutex<Vec<Job>>,
    retry_policy: RetryPolicy,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobQueue {
    /// Retries become claimable immediately.
    pub fn new() -> Self {
        Self::with_retry_policy(RetryPolicy::immediate())
    }

    pub fn with_retry_policy(retry_policy: RetryPolicy) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            retry_policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Job>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every job ever submitted, in submission order.
    pub fn all(&self) -> Vec<Job> {
        self.lock().clone()
    }

    pub fn jobs_of_type(&self, job_type: &str) -> Vec<Job> {
        self.lock()
            .iter()
            .filter(|job| job.job_type == job_type)
            .cloned()
            .collect()
    }

    /// Payloads of every job of one type, in submission order.
    pub fn payloads<C: DeserializeOwned>(&self, job_type: &str) -> Result<Vec<C>> {
        self.jobs_of_type(job_type)
            .into_iter()
            .map(|job| serde_json::from_value(job.args).map_err(Into::into))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|job| job.status == JobStatus::Pending)
            .count()
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.lock().iter().filter(|job| job.status == status).count()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue_payload(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        spec: JobSpec,
    ) -> Result<EnqueueResult> {
        let mut jobs = self.lock();

        if let Some(key) = &spec.idempotency_key {
            let existing = jobs.iter().find(|job| {
                job.idempotency_key.as_deref() == Some(key.as_str())
                    && matches!(job.status, JobStatus::Pending | JobStatus::Running)
            });
            if let Some(existing) = existing {
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let job = Job::for_command(job_type, payload, &spec, 60_000);
        let id = job.id;
        jobs.push(job);
        Ok(EnqueueResult::Created(id))
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>> {
        let now = Utc::now();
        let mut jobs = self.lock();

        let mut ready: Vec<usize> = jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.is_ready() || job.lease_expired())
            .map(|(index, _)| index)
            .collect();
        ready.sort_by_key(|&index| {
            let job = &jobs[index];
            (job.priority.as_i16(), job.next_run_at.unwrap_or(job.created_at))
        });

        let mut claimed = Vec::new();
        for index in ready.into_iter().take(limit.max(0) as usize) {
            let job = &mut jobs[index];
            job.status = JobStatus::Running;
            job.worker_id = Some(worker_id.to_string());
            job.last_run_at = Some(now);
            job.lease_expires_at = Some(now + Duration::milliseconds(job.lease_duration_ms));
            job.updated_at = now;
            claimed.push(ClaimedJob::from(job.clone()));
        }

        Ok(claimed)
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        let mut jobs = self.lock();
        let job = find_mut(&mut jobs, job_id)?;
        job.status = JobStatus::Succeeded;
        job.lease_expires_at = None;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<FailureOutcome> {
        let now = Utc::now();
        let mut jobs = self.lock();
        let job = find_mut(&mut jobs, job_id)?;

        job.error_message = Some(error.to_string());
        job.error_kind = Some(kind);
        job.lease_expires_at = None;
        job.updated_at = now;

        if job.can_retry(kind) {
            job.status = JobStatus::Failed;
            let retry_at = now + self.retry_policy.delay_for(job.retry_count);
            let retry = job.create_retry(retry_at);
            let attempt = retry.attempt;
            jobs.push(retry);
            return Ok(FailureOutcome::Retrying { attempt, retry_at });
        }

        let reason = if kind.should_retry() {
            "max retries exceeded"
        } else {
            "non-retryable error"
        };
        job.status = JobStatus::DeadLetter;
        job.dead_lettered_at = Some(now);
        job.dead_letter_reason = Some(reason.to_string());

        Ok(FailureOutcome::DeadLettered {
            attempts: job.attempt,
            reason: reason.to_string(),
        })
    }

    async fn heartbeat(&self, job_id: Uuid) -> Result<()> {
        let mut jobs = self.lock();
        let job = find_mut(&mut jobs, job_id)?;
        if job.status == JobStatus::Running {
            job.lease_expires_at = Some(Utc::now() + Duration::milliseconds(job.lease_duration_ms));
        }
        Ok(())
    }

    async fn dead_letters(&self, limit: i64) -> Result<Vec<Job>> {
        let mut dead: Vec<Job> = self
            .lock()
            .iter()
            .filter(|job| job.status == JobStatus::DeadLetter && job.resolved_at.is_none())
            .cloned()
            .collect();
        dead.sort_by(|a, b| b.dead_lettered_at.cmp(&a.dead_lettered_at));
        dead.truncate(limit.max(0) as usize);
        Ok(dead)
    }

    async fn replay(&self, job_id: Uuid) -> Result<Uuid> {
        let mut jobs = self.lock();
        let job = find_mut(&mut jobs, job_id)?;
        if job.status != JobStatus::DeadLetter {
            return Err(anyhow!("job {} is not dead-lettered", job_id));
        }
        job.resolved_at = Some(Utc::now());
        let replay = job.create_replay();
        let id = replay.id;
        jobs.push(replay);
        Ok(id)
    }
}

fn find_mut(jobs: &mut [Job], job_id: Uuid) -> Result<&mut Job> {
    jobs.iter_mut()
        .find(|job| job.id == job_id)
        .ok_or_else(|| anyhow!("job {} not found", job_id))
}
