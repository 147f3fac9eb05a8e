//! Job registry for deserializing and executing jobs.
//!
//! The registry maps job type strings (e.g., "student.status_updated") to
//! handlers that reconstruct the typed job from its JSON payload and run it.
//! This lets the JobRunner dispatch claimed jobs without knowing the
//! concrete types.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;

use super::queue::{ClaimedJob, CommandMeta};
use crate::common::PipelineError;
use crate::kernel::ServerDeps;

type BoxedHandler = Box<
    dyn Fn(serde_json::Value, Arc<ServerDeps>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Registry that maps job type strings to handlers.
///
/// Each domain registers its job types at startup:
///
/// ```ignore
/// let mut registry = JobRegistry::new();
/// registry.register::<StatusUpdatedJob, _, _>(StatusUpdatedJob::JOB_TYPE, |job, deps| async move {
///     handle_status_updated(job, deps).await
/// });
///
/// // Later, in JobRunner
/// registry.execute(&claimed_job, deps.clone()).await?;
/// ```
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, BoxedHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a job type with its handler.
    ///
    /// A payload that does not deserialize into `J` fails with
    /// [`PipelineError::InvalidPayload`], which is never retried.
    pub fn register<J, F, Fut>(&mut self, job_type: &'static str, handler: F)
    where
        J: CommandMeta + DeserializeOwned + Send + Sync + 'static,
        F: Fn(J, Arc<ServerDeps>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let boxed_handler: BoxedHandler = Box::new(move |value, deps| {
            let handler = handler.clone();
            Box::pin(async move {
                let job: J = serde_json::from_value(value).map_err(|e| PipelineError::InvalidPayload {
                    job_type: job_type.to_string(),
                    message: e.to_string(),
                })?;
                handler(job, deps).await
            })
        });

        self.handlers.insert(job_type, boxed_handler);
    }

    /// Execute a claimed job using its registered handler.
    pub async fn execute(&self, job: &ClaimedJob, deps: Arc<ServerDeps>) -> Result<()> {
        let job_type = job.command_type();
        let handler = self
            .handlers
            .get(job_type)
            .ok_or_else(|| PipelineError::UnknownJobType(job_type.to_string()))?;

        handler(job.job.args.clone(), deps).await
    }

    /// Check if a job type is registered.
    pub fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Get all registered job types.
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

/// Thread-safe registry wrapped in Arc.
pub type SharedJobRegistry = Arc<JobRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::kernel::jobs::{Job, JobSpec};
    use crate::kernel::test_dependencies::TestDependencies;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestJob {
        name: String,
    }

    impl CommandMeta for TestJob {
        fn command_type(&self) -> &'static str {
            "test_job"
        }
    }

    fn claimed(args: serde_json::Value) -> ClaimedJob {
        ClaimedJob::from(Job::for_command("test_job", args, &JobSpec::default(), 60_000))
    }

    #[test]
    fn test_register_and_check() {
        let mut registry = JobRegistry::new();
        registry.register::<TestJob, _, _>("test_job", |_job, _deps| async move { Ok(()) });

        assert!(registry.is_registered("test_job"));
        assert!(!registry.is_registered("unknown_job"));
        assert_eq!(registry.registered_types(), vec!["test_job"]);
    }

    #[tokio::test]
    async fn execute_deserializes_and_runs_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut registry = JobRegistry::new();
        registry.register::<TestJob, _, _>("test_job", move |job, _deps| {
            let seen = seen.clone();
            async move {
                assert_eq!(job.name, "ada");
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let deps = TestDependencies::new().into_server_deps();
        registry
            .execute(&claimed(serde_json::json!({"name": "ada"})), deps)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bad_payload_is_invalid_payload_error() {
        let mut registry = JobRegistry::new();
        registry.register::<TestJob, _, _>("test_job", |_job, _deps| async move { Ok(()) });

        let deps = TestDependencies::new().into_server_deps();
        let err = registry
            .execute(&claimed(serde_json::json!({"wrong": true})), deps)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidPayload { .. })
        ));
    }

    #[tokio::test]
    async fn unregistered_type_is_rejected() {
        let registry = JobRegistry::new();
        let deps = TestDependencies::new().into_server_deps();
        let err = registry
            .execute(&claimed(serde_json::json!({})), deps)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnknownJobType(t)) if t == "test_job"
        ));
    }
}
