//! Job runner service for processing background jobs.
//!
//! The `JobRunner` is a background service that:
//! - Polls the queue for ready jobs
//! - Executes each claimed batch concurrently through the registry
//! - Keeps leases alive with heartbeats while handlers run
//! - Marks outcomes, letting the queue schedule retries or dead-letter
//!
//! # Architecture
//!
//! ```text
//! JobRunner
//!     │
//!     ├─► claim (JobQueue)
//!     ├─► execute via JobRegistry (deserialize + call handler)
//!     └─► mark succeeded / failed
//!             └─► DeadLettered → error! + alert to the alerts channel
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::queue::{ClaimedJob, FailureOutcome, JobQueue};
use super::registry::SharedJobRegistry;
use super::ErrorKind;
use crate::common::PipelineError;
use crate::config::Config;
use crate::kernel::{ExternalServiceError, NotificationWorkspace, ServerDeps};

/// Configuration for the job runner.
#[derive(Debug, Clone)]
pub struct JobRunnerConfig {
    /// Maximum number of jobs to claim at once
    pub batch_size: i64,
    /// How long to wait when no jobs are available
    pub poll_interval: Duration,
    /// How often a running job's lease is extended
    pub heartbeat_interval: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(20),
            worker_id: format!("runner-{}", Uuid::new_v4()),
        }
    }
}

impl JobRunnerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.job_worker_batch_size,
            poll_interval: Duration::from_millis(config.job_worker_poll_interval_ms),
            ..Default::default()
        }
    }
}

/// Background service that processes jobs from the queue.
pub struct JobRunner {
    job_queue: Arc<dyn JobQueue>,
    registry: SharedJobRegistry,
    deps: Arc<ServerDeps>,
    config: JobRunnerConfig,
    shutdown: Arc<AtomicBool>,
}

impl JobRunner {
    /// Create a new job runner.
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<ServerDeps>,
    ) -> Self {
        Self::with_config(job_queue, registry, deps, JobRunnerConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(
        job_queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<ServerDeps>,
        config: JobRunnerConfig,
    ) -> Self {
        Self {
            job_queue,
            registry,
            deps,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a shutdown handle for graceful shutdown.
    ///
    /// Call `store(true, Ordering::SeqCst)` on the returned Arc to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run the job runner until shutdown is requested.
    ///
    /// The batch in flight when shutdown is requested runs to completion.
    pub async fn run(self) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "job runner starting"
        );

        while !self.is_shutdown_requested() {
            let jobs = match self
                .job_queue
                .claim(&self.config.worker_id, self.config.batch_size)
                .await
            {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if jobs.is_empty() {
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            }

            debug!(count = jobs.len(), "claimed jobs");
            self.process_batch(jobs).await;
        }

        info!(worker_id = %self.config.worker_id, "job runner stopped");
        Ok(())
    }

    /// Run until a shutdown signal is received.
    ///
    /// Convenience method that listens for Ctrl+C.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let shutdown = self.shutdown_handle();

        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            shutdown.store(true, Ordering::SeqCst);
        });

        self.run().await
    }

    /// Claim and execute until nothing is ready, returning how many jobs ran.
    ///
    /// Jobs submitted by handlers are picked up in later rounds, so a whole
    /// fan-out drains in one call. Retries scheduled in the future are not
    /// waited for.
    pub async fn run_until_idle(&self) -> Result<usize> {
        let mut processed = 0;
        loop {
            let jobs = self
                .job_queue
                .claim(&self.config.worker_id, self.config.batch_size)
                .await?;
            if jobs.is_empty() {
                return Ok(processed);
            }
            processed += jobs.len();
            self.process_batch(jobs).await;
        }
    }

    async fn process_batch(&self, jobs: Vec<ClaimedJob>) {
        join_all(jobs.into_iter().map(|job| self.process_job(job))).await;
    }

    async fn process_job(&self, job: ClaimedJob) {
        let job_id = job.id;
        let job_type = job.command_type().to_string();

        debug!(job_id = %job_id, job_type = %job_type, attempt = job.job.attempt, "executing job");

        let result = self.execute_with_heartbeat(&job).await;

        match result {
            Ok(()) => {
                info!(job_id = %job_id, job_type = %job_type, "job succeeded");
                if let Err(e) = self.job_queue.mark_succeeded(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as succeeded");
                }
            }
            Err(e) => {
                let error_kind = classify_error(&e);
                let message = format!("{:#}", e);

                match self.job_queue.mark_failed(job_id, &message, error_kind).await {
                    Ok(FailureOutcome::Retrying { attempt, retry_at }) => {
                        warn!(
                            job_id = %job_id,
                            job_type = %job_type,
                            error = %message,
                            next_attempt = attempt,
                            retry_at = %retry_at,
                            "job failed, retry scheduled"
                        );
                    }
                    Ok(FailureOutcome::DeadLettered { attempts, reason }) => {
                        error!(
                            job_id = %job_id,
                            job_type = %job_type,
                            error = %message,
                            attempts,
                            reason = %reason,
                            "job dead-lettered"
                        );
                        self.alert_dead_letter(job_id, &job_type, attempts, &message).await;
                    }
                    Err(mark_err) => {
                        error!(job_id = %job_id, error = %mark_err, "failed to mark job as failed");
                    }
                }
            }
        }
    }

    async fn execute_with_heartbeat(&self, job: &ClaimedJob) -> Result<()> {
        let queue = self.job_queue.clone();
        let job_id = job.id;
        let heartbeat_interval = self.config.heartbeat_interval;

        let heartbeat = tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat_interval);
            interval.tick().await; // Skip first immediate tick
            loop {
                interval.tick().await;
                if let Err(e) = queue.heartbeat(job_id).await {
                    warn!(job_id = %job_id, error = %e, "heartbeat failed");
                }
            }
        });

        let result = self.registry.execute(job, self.deps.clone()).await;
        heartbeat.abort();
        result
    }

    /// Best-effort operator alert; a failure here never affects the job.
    async fn alert_dead_letter(&self, job_id: Uuid, job_type: &str, attempts: i32, error: &str) {
        let message = format!(
            "Job `{}` ({}) was moved to the dead letter queue after {} attempt(s): {}",
            job_type, job_id, attempts, error
        );

        if let Err(e) = self
            .deps
            .internal_notifier
            .send(&message, NotificationWorkspace::Alerts)
            .await
        {
            warn!(job_id = %job_id, error = %e, "failed to send dead letter alert");
        }
    }
}

/// Classify an error to determine retry behavior.
///
/// Typed errors decide first: transient external failures retry, rejected
/// requests and pipeline errors do not. Anything else falls back to the
/// message text, defaulting to retryable.
pub fn classify_error(error: &anyhow::Error) -> ErrorKind {
    if let Some(external) = error.downcast_ref::<ExternalServiceError>() {
        return if external.is_transient() {
            ErrorKind::Retryable
        } else {
            ErrorKind::NonRetryable
        };
    }

    if error.downcast_ref::<PipelineError>().is_some()
        || error.downcast_ref::<serde_json::Error>().is_some()
    {
        return ErrorKind::NonRetryable;
    }

    if let Some(sqlx::Error::RowNotFound) = error.downcast_ref::<sqlx::Error>() {
        return ErrorKind::NonRetryable;
    }

    let error_str = error.to_string().to_lowercase();

    // Non-retryable: validation errors, not found, permission denied
    if error_str.contains("not found")
        || error_str.contains("invalid")
        || error_str.contains("permission denied")
        || error_str.contains("unauthorized")
        || error_str.contains("forbidden")
    {
        return ErrorKind::NonRetryable;
    }

    // Non-retryable: deserialization errors
    if error_str.contains("deserialize") || error_str.contains("parse") {
        return ErrorKind::NonRetryable;
    }

    // Everything else is retryable (network errors, timeouts, etc.)
    ErrorKind::Retryable
}
