//! Integration tests for the Postgres-backed job queue.

mod common;

use std::sync::Arc;

use crate::common::{create_member, TestHarness};
use member_sync::domains::build_job_registry;
use member_sync::domains::member::jobs::BatchUpdateStatusJob;
use member_sync::domains::member::models::MemberStatus;
use member_sync::domains::slack::InviteSlackJob;
use member_sync::kernel::jobs::{
    EnqueueResult, ErrorKind, FailureOutcome, Job, JobQueue, JobQueueExt, JobRunner,
    JobRunnerConfig, JobSpec, JobStatus, PostgresJobQueue, RetryPolicy,
};
use member_sync::kernel::ServerDeps;
use serde_json::json;
use test_context::test_context;

fn queue(ctx: &TestHarness) -> PostgresJobQueue {
    PostgresJobQueue::new(ctx.db_pool.clone()).with_retry_policy(RetryPolicy::immediate())
}

#[test_context(TestHarness)]
#[tokio::test]
async fn claims_each_job_once(ctx: &TestHarness) {
    let queue = queue(ctx);
    for i in 0..3 {
        queue
            .enqueue_payload("test.job", json!({ "n": i }), JobSpec::default())
            .await
            .unwrap();
    }

    let first = queue.claim("worker-a", 2).await.unwrap();
    let second = queue.claim("worker-b", 5).await.unwrap();
    let third = queue.claim("worker-c", 5).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert!(third.is_empty());

    let running = Job::find_by_id(first[0].id, &ctx.db_pool).await.unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert_eq!(running.worker_id.as_deref(), Some("worker-a"));
    assert!(running.lease_expires_at.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn idempotency_key_returns_existing_job(ctx: &TestHarness) {
    let queue = queue(ctx);
    let invite = || InviteSlackJob {
        email: "Ada@Example.com".into(),
    };

    let first = queue.enqueue(invite()).await.unwrap();
    let second = queue
        .enqueue(InviteSlackJob {
            email: "ada@example.com".into(),
        })
        .await
        .unwrap();

    assert!(first.is_created());
    assert_eq!(second, EnqueueResult::Duplicate(first.job_id()));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_submissions_with_one_key_create_one_job(ctx: &TestHarness) {
    let queue = queue(ctx);
    let results = futures::future::join_all((0..8).map(|_| {
        queue.enqueue_payload(
            "slack.invite",
            json!({ "email": "ada@example.com" }),
            JobSpec::builder()
                .idempotency_key(Some("slack.invite:ada@example.com".to_string()))
                .build(),
        )
    }))
    .await;
    let results: Vec<EnqueueResult> = results.into_iter().map(|r| r.unwrap()).collect();

    let created: Vec<_> = results.iter().filter(|r| r.is_created()).collect();
    assert_eq!(created.len(), 1);
    let winner = created[0].job_id();
    assert!(results.iter().all(|r| r.job_id() == winner));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE job_type = 'slack.invite'")
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn retryable_failure_schedules_another_attempt_then_dead_letters(ctx: &TestHarness) {
    let queue = queue(ctx).with_max_retries(1);
    queue
        .enqueue_payload("test.flaky", json!({}), JobSpec::default())
        .await
        .unwrap();

    let attempt_one = queue.claim("w", 1).await.unwrap().remove(0);
    let outcome = queue
        .mark_failed(attempt_one.id, "connection reset", ErrorKind::Retryable)
        .await
        .unwrap();
    assert!(matches!(outcome, FailureOutcome::Retrying { attempt: 2, .. }));

    let attempt_two = queue.claim("w", 1).await.unwrap().remove(0);
    assert_ne!(attempt_two.id, attempt_one.id);
    assert_eq!(attempt_two.job.root_job_id, Some(attempt_one.id));

    let outcome = queue
        .mark_failed(attempt_two.id, "connection reset", ErrorKind::Retryable)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        FailureOutcome::DeadLettered {
            attempts: 2,
            reason: "max retries exceeded".into(),
        }
    );

    let dead = queue.dead_letters(10).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].id, attempt_two.id);
    assert_eq!(dead[0].error_message.as_deref(), Some("connection reset"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn non_retryable_failure_dead_letters_immediately(ctx: &TestHarness) {
    let queue = queue(ctx);
    queue
        .enqueue_payload("test.bad", json!({}), JobSpec::default())
        .await
        .unwrap();

    let claimed = queue.claim("w", 1).await.unwrap().remove(0);
    let outcome = queue
        .mark_failed(claimed.id, "invalid email", ErrorKind::NonRetryable)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        FailureOutcome::DeadLettered {
            attempts: 1,
            reason: "non-retryable error".into(),
        }
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn replay_resolves_the_dead_letter_and_requeues(ctx: &TestHarness) {
    let queue = queue(ctx);
    queue
        .enqueue_payload("test.bad", json!({ "x": 1 }), JobSpec::default())
        .await
        .unwrap();
    let claimed = queue.claim("w", 1).await.unwrap().remove(0);
    queue
        .mark_failed(claimed.id, "boom", ErrorKind::NonRetryable)
        .await
        .unwrap();

    let replay_id = queue.replay(claimed.id).await.unwrap();

    assert!(queue.dead_letters(10).await.unwrap().is_empty());
    let original = Job::find_by_id(claimed.id, &ctx.db_pool).await.unwrap();
    assert!(original.resolved_at.is_some());

    let replay = Job::find_by_id(replay_id, &ctx.db_pool).await.unwrap();
    assert_eq!(replay.status, JobStatus::Pending);
    assert_eq!(replay.replay_count, 1);
    assert_eq!(replay.attempt, 1);
    assert_eq!(replay.args, json!({ "x": 1 }));

    assert!(queue.replay(replay_id).await.is_err());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn runner_drains_a_status_change_through_postgres(ctx: &TestHarness) {
    let member = create_member(&ctx.db_pool, "Oli", MemberStatus::Active, Some("U8"))
        .await
        .unwrap();

    let queue: Arc<dyn JobQueue> = Arc::new(queue(ctx));
    let mocks = &ctx.mocks;
    let deps = Arc::new(ServerDeps::new(
        ctx.db_pool.clone(),
        queue.clone(),
        mocks.records.clone(),
        mocks.mailing_list.clone(),
        mocks.chat.clone(),
        mocks.email.clone(),
        mocks.internal_notifier.clone(),
        ctx.deps().members_table.clone(),
    ));

    queue
        .enqueue(BatchUpdateStatusJob::new(vec![member.id.clone()], MemberStatus::Inactive))
        .await
        .unwrap();

    let runner = JobRunner::with_config(
        queue,
        build_job_registry(),
        deps,
        JobRunnerConfig::with_worker_id("pg-runner"),
    );
    let processed = runner.run_until_idle().await.unwrap();

    // batch + event + record, mailing list, notice, chat
    assert_eq!(processed, 6);
    assert_eq!(mocks.chat.deactivated(), vec!["U8".to_string()]);
    assert_eq!(mocks.mailing_list.removed(), vec![member.email.clone()]);

    let succeeded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = 'succeeded'")
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(succeeded, 6);
}
