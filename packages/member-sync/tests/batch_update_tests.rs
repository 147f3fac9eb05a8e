//! Integration tests for the batch status updater.
//!
//! The updater is the only status writer: it writes every listed member in
//! one transaction and submits one `student.status_updated` event per row
//! actually written.

mod common;

use crate::common::{create_active_member, create_member, status_of, TestHarness};
use member_sync::common::{MemberId, PipelineError};
use member_sync::domains::member::activities::apply_batch_update;
use member_sync::domains::member::jobs::{BatchUpdateStatusJob, StatusUpdatedJob};
use member_sync::domains::member::models::{Member, MemberStatus};
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn writes_status_and_emits_one_event_per_member(ctx: &TestHarness) {
    let mut ids = Vec::new();
    for i in 0..10 {
        let member = create_active_member(&ctx.db_pool, &format!("Member{i}"))
            .await
            .unwrap();
        ids.push(member.id);
    }

    let job = BatchUpdateStatusJob::new(ids.clone(), MemberStatus::Inactive);
    let outcome = apply_batch_update(&job, &ctx.deps()).await.unwrap();

    assert_eq!(outcome.updated.len(), 10);
    assert!(outcome.missing.is_empty());
    for id in &ids {
        assert_eq!(status_of(&ctx.db_pool, id).await.unwrap(), MemberStatus::Inactive);
    }

    let events: Vec<StatusUpdatedJob> = ctx.mocks.jobs.payloads(StatusUpdatedJob::JOB_TYPE).unwrap();
    assert_eq!(events.len(), 10);
    let mut event_ids: Vec<MemberId> = events.iter().map(|e| e.student_id.clone()).collect();
    event_ids.sort();
    ids.sort();
    assert_eq!(event_ids, ids);
    assert!(events.iter().all(|e| e.status == MemberStatus::Inactive));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn events_carry_correlation_data_from_the_write(ctx: &TestHarness) {
    let member = create_member(&ctx.db_pool, "Grace", MemberStatus::Active, Some("U42"))
        .await
        .unwrap();

    let job = BatchUpdateStatusJob::new(vec![member.id.clone()], MemberStatus::Inactive)
        .with_violation_email(true);
    apply_batch_update(&job, &ctx.deps()).await.unwrap();

    let events: Vec<StatusUpdatedJob> = ctx.mocks.jobs.payloads(StatusUpdatedJob::JOB_TYPE).unwrap();
    assert_eq!(
        events,
        vec![StatusUpdatedJob {
            student_id: member.id,
            airtable_id: member.airtable_id,
            email: member.email,
            first_name: "Grace".into(),
            slack_id: Some("U42".into()),
            status: MemberStatus::Inactive,
            send_violation_email: true,
        }]
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_ids_are_skipped_without_events(ctx: &TestHarness) {
    let a = create_active_member(&ctx.db_pool, "Ada").await.unwrap();
    let b = create_active_member(&ctx.db_pool, "Bea").await.unwrap();
    let ghost = MemberId::new("does-not-exist");

    let job = BatchUpdateStatusJob::new(
        vec![a.id.clone(), ghost.clone(), b.id.clone()],
        MemberStatus::BulkRemoved,
    );
    let outcome = apply_batch_update(&job, &ctx.deps()).await.unwrap();

    assert_eq!(outcome.updated.len(), 2);
    assert_eq!(outcome.missing, vec![ghost]);
    assert_eq!(ctx.mocks.jobs.jobs_of_type(StatusUpdatedJob::JOB_TYPE).len(), 2);
    assert_eq!(status_of(&ctx.db_pool, &a.id).await.unwrap(), MemberStatus::BulkRemoved);
    assert_eq!(status_of(&ctx.db_pool, &b.id).await.unwrap(), MemberStatus::BulkRemoved);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn empty_batch_fails_without_side_effects(ctx: &TestHarness) {
    let job = BatchUpdateStatusJob::new(vec![], MemberStatus::Inactive);
    let err = apply_batch_update(&job, &ctx.deps()).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::EmptyBatch)
    ));
    assert!(ctx.mocks.jobs.all().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn one_failing_row_fails_the_whole_batch(ctx: &TestHarness) {
    let m1 = create_active_member(&ctx.db_pool, "Ada").await.unwrap();
    let m2 = create_active_member(&ctx.db_pool, "Bea").await.unwrap();

    // Only m2's row refuses the write.
    sqlx::query(&format!(
        "CREATE FUNCTION reject_status_write() RETURNS trigger AS $$
         BEGIN
           IF NEW.id = '{}' THEN RAISE EXCEPTION 'status writes disabled'; END IF;
           RETURN NEW;
         END;
         $$ LANGUAGE plpgsql",
        m2.id
    ))
    .execute(&ctx.db_pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_status_write BEFORE UPDATE ON students
         FOR EACH ROW EXECUTE FUNCTION reject_status_write()",
    )
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let job = BatchUpdateStatusJob::new(vec![m1.id.clone(), m2.id.clone()], MemberStatus::Inactive);
    assert!(apply_batch_update(&job, &ctx.deps()).await.is_err());

    assert_eq!(status_of(&ctx.db_pool, &m1.id).await.unwrap(), MemberStatus::Active);
    assert_eq!(status_of(&ctx.db_pool, &m2.id).await.unwrap(), MemberStatus::Active);
    assert!(ctx.mocks.jobs.jobs_of_type(StatusUpdatedJob::JOB_TYPE).is_empty());
    assert!(ctx.mocks.jobs.all().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn batches_above_the_ceiling_are_written_in_one_call(ctx: &TestHarness) {
    let mut ids = Vec::new();
    for i in 0..13 {
        let member = create_active_member(&ctx.db_pool, &format!("Big{i}")).await.unwrap();
        ids.push(member.id);
    }

    let job = BatchUpdateStatusJob::new(ids.clone(), MemberStatus::BulkRemoved);
    let outcome = apply_batch_update(&job, &ctx.deps()).await.unwrap();

    assert_eq!(outcome.updated.len(), 13);
    for id in &ids {
        assert_eq!(status_of(&ctx.db_pool, id).await.unwrap(), MemberStatus::BulkRemoved);
    }

    let events: Vec<StatusUpdatedJob> = ctx.mocks.jobs.payloads(StatusUpdatedJob::JOB_TYPE).unwrap();
    let mut event_ids: Vec<MemberId> = events.into_iter().map(|e| e.student_id).collect();
    event_ids.sort();
    ids.sort();
    assert_eq!(event_ids, ids);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn active_lookup_by_email_follows_the_written_status(ctx: &TestHarness) {
    let member = create_active_member(&ctx.db_pool, "Ivy").await.unwrap();
    let shouted = member.email.to_uppercase();

    let found = Member::find_active_by_email(&shouted, &ctx.db_pool).await.unwrap();
    assert_eq!(found.map(|m| m.id), Some(member.id.clone()));

    let job = BatchUpdateStatusJob::new(vec![member.id.clone()], MemberStatus::Inactive);
    apply_batch_update(&job, &ctx.deps()).await.unwrap();

    assert!(Member::find_active_by_email(&member.email, &ctx.db_pool)
        .await
        .unwrap()
        .is_none());
}
