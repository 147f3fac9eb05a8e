//! Status write path: the batch updater and the admin actions that feed it.
//!
//! Status is only ever written by [`apply_batch_update`]. Admin actions and
//! onboarding reactivation submit `student.batch_update_status` jobs instead
//! of touching the `students` table.

use anyhow::Result;
use tracing::{info, warn};

use crate::common::{MemberId, PipelineError};
use crate::domains::member::jobs::{BatchUpdateStatusJob, StatusUpdatedJob, RECOMMENDED_BATCH_SIZE};
use crate::domains::member::models::{Member, MemberStatus};
use crate::kernel::jobs::{EnqueueResult, JobQueueExt};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUpdateOutcome {
    /// Members whose row was written, in database order.
    pub updated: Vec<MemberId>,
    /// Requested ids with no matching row.
    pub missing: Vec<MemberId>,
}

/// Write `job.status` for every listed member, then submit one
/// `student.status_updated` event per member actually updated.
///
/// Events are submitted only after the write commits. Unknown ids are
/// skipped and produce no event.
pub async fn apply_batch_update(
    job: &BatchUpdateStatusJob,
    deps: &ServerDeps,
) -> Result<BatchUpdateOutcome> {
    if job.member_ids.is_empty() {
        return Err(PipelineError::EmptyBatch.into());
    }

    if job.member_ids.len() > RECOMMENDED_BATCH_SIZE {
        warn!(
            count = job.member_ids.len(),
            recommended = RECOMMENDED_BATCH_SIZE,
            "batch larger than recommended; callers should chunk"
        );
    }

    let rows = Member::batch_update_status(&job.member_ids, job.status, &deps.db_pool).await?;

    let updated: Vec<MemberId> = rows.iter().map(|row| row.id.clone()).collect();
    let missing: Vec<MemberId> = job
        .member_ids
        .iter()
        .filter(|id| !updated.contains(id))
        .cloned()
        .collect();

    if !missing.is_empty() {
        warn!(
            missing = ?missing,
            status = %job.status,
            "skipping unknown member ids"
        );
    }

    for row in rows {
        let event = StatusUpdatedJob::from_update(row, job.status, job.send_violation_email);
        deps.jobs.enqueue(event).await?;
    }

    info!(
        status = %job.status,
        updated = updated.len(),
        requested = job.member_ids.len(),
        "batch status update applied"
    );

    Ok(BatchUpdateOutcome { updated, missing })
}

/// Change one member's status through the batch updater.
///
/// The violation email is only sent for deactivation; the flag is dropped
/// for every other target status.
pub async fn change_member_status(
    member_id: MemberId,
    status: MemberStatus,
    send_violation_email: bool,
    deps: &ServerDeps,
) -> Result<EnqueueResult> {
    let send_violation_email = send_violation_email && status == MemberStatus::Inactive;

    let job = BatchUpdateStatusJob::new(vec![member_id.clone()], status)
        .with_violation_email(send_violation_email);
    let result = deps.jobs.enqueue(job).await?;

    info!(
        member_id = %member_id,
        status = %status,
        send_violation_email,
        job_id = %result.job_id(),
        "member status change submitted"
    );

    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitSummary {
    pub members: usize,
    pub chunks: usize,
}

/// Submit one batch job per chunk of ten ids, all with the same status.
pub async fn submit_status_changes(
    member_ids: Vec<MemberId>,
    status: MemberStatus,
    send_violation_email: bool,
    deps: &ServerDeps,
) -> Result<SubmitSummary> {
    if member_ids.is_empty() {
        return Err(PipelineError::EmptyBatch.into());
    }

    let mut chunks = 0;
    for chunk in member_ids.chunks(RECOMMENDED_BATCH_SIZE) {
        let job = BatchUpdateStatusJob::new(chunk.to_vec(), status)
            .with_violation_email(send_violation_email);
        deps.jobs.enqueue(job).await?;
        chunks += 1;
    }

    info!(
        members = member_ids.len(),
        chunks,
        status = %status,
        "status changes submitted"
    );

    Ok(SubmitSummary {
        members: member_ids.len(),
        chunks,
    })
}

/// Mark many members BULK_REMOVED. No violation email is sent.
pub async fn bulk_remove(member_ids: Vec<MemberId>, deps: &ServerDeps) -> Result<SubmitSummary> {
    submit_status_changes(member_ids, MemberStatus::BulkRemoved, false, deps).await
}

/// Parse a newline-separated id list. Blank lines are ignored.
pub fn parse_member_ids(text: &str) -> Vec<MemberId> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(MemberId::from)
        .collect()
}
