//! Job handlers for the member domain.
//!
//! ```text
//! student.batch_update_status → apply_batch_update  → N × student.status_updated
//! student.status_updated      → route_status_update → side-effect jobs
//! student.engagement.backfill → backfill_engagement → terminal
//! ```

use std::sync::Arc;

use anyhow::Result;

use crate::domains::member::activities;
use crate::domains::member::jobs::{BatchUpdateStatusJob, EngagementBackfillJob, StatusUpdatedJob};
use crate::kernel::jobs::JobRegistry;
use crate::kernel::ServerDeps;

pub async fn handle_batch_update_status(job: BatchUpdateStatusJob, deps: Arc<ServerDeps>) -> Result<()> {
    activities::apply_batch_update(&job, &deps).await?;
    Ok(())
}

pub async fn handle_status_updated(job: StatusUpdatedJob, deps: Arc<ServerDeps>) -> Result<()> {
    activities::route_status_update(&job, &deps).await?;
    Ok(())
}

pub async fn handle_engagement_backfill(job: EngagementBackfillJob, deps: Arc<ServerDeps>) -> Result<()> {
    activities::backfill_engagement(&job, &deps.db_pool).await?;
    Ok(())
}

pub fn register_member_jobs(registry: &mut JobRegistry) {
    registry.register::<BatchUpdateStatusJob, _, _>(BatchUpdateStatusJob::JOB_TYPE, |job, deps| async move {
        handle_batch_update_status(job, deps).await
    });

    registry.register::<StatusUpdatedJob, _, _>(StatusUpdatedJob::JOB_TYPE, |job, deps| async move {
        handle_status_updated(job, deps).await
    });

    registry.register::<EngagementBackfillJob, _, _>(EngagementBackfillJob::JOB_TYPE, |job, deps| async move {
        handle_engagement_backfill(job, deps).await
    });
}
