//! Job infrastructure for background command execution.
//!
//! - [`JobQueue`] - durable submission, claiming and outcome tracking
//! - [`PostgresJobQueue`] - the production queue on the `jobs` table
//! - [`InMemoryJobQueue`](testing::InMemoryJobQueue) - same semantics, no database
//! - [`JobRegistry`] - job type name to handler
//! - [`JobRunner`] - long-running service that claims and executes jobs
//!
//! # Architecture
//!
//! ```text
//! activity / handler calls deps.jobs.enqueue(cmd)
//!     │
//!     └─► insert into jobs (pending)
//!
//! JobRunner
//!     │
//!     ├─► claim ready jobs (lease)
//!     ├─► JobRegistry.execute(job) → domain handler
//!     └─► mark succeeded / failed (retry with backoff, or dead letter)
//! ```
//!
//! Job types and handlers live in their domains; this module is only the
//! infrastructure.

mod job;
mod queue;
mod registry;
mod runner;
pub mod testing;

pub use job::{ErrorKind, Job, JobPriority, JobSpec, JobStatus, RetryPolicy};
pub use queue::{
    ClaimedJob, CommandMeta, EnqueueResult, FailureOutcome, JobQueue, JobQueueExt,
    PostgresJobQueue,
};
pub use registry::{JobRegistry, SharedJobRegistry};
pub use runner::{classify_error, JobRunner, JobRunnerConfig};
