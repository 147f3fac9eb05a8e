//! Job handlers for the slack domain.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::domains::slack::jobs::{ActivateSlackJob, DeactivateSlackJob, InviteSlackJob};
use crate::kernel::jobs::JobRegistry;
use crate::kernel::ServerDeps;

pub async fn handle_activate(job: ActivateSlackJob, deps: Arc<ServerDeps>) -> Result<()> {
    deps.chat
        .activate(&job.slack_id)
        .await
        .with_context(|| format!("activating slack account {}", job.slack_id))?;

    info!(slack_id = %job.slack_id, "slack account activated");
    Ok(())
}

pub async fn handle_deactivate(job: DeactivateSlackJob, deps: Arc<ServerDeps>) -> Result<()> {
    deps.chat
        .deactivate(&job.slack_id)
        .await
        .with_context(|| format!("deactivating slack account {}", job.slack_id))?;

    info!(slack_id = %job.slack_id, "slack account deactivated");
    Ok(())
}

pub async fn handle_invite(job: InviteSlackJob, deps: Arc<ServerDeps>) -> Result<()> {
    deps.chat
        .invite(&job.email)
        .await
        .with_context(|| format!("inviting {} to slack", job.email))?;

    info!(email = %job.email, "slack invitation handled");
    Ok(())
}

pub fn register_slack_jobs(registry: &mut JobRegistry) {
    registry.register::<ActivateSlackJob, _, _>(ActivateSlackJob::JOB_TYPE, |job, deps| async move {
        handle_activate(job, deps).await
    });

    registry.register::<DeactivateSlackJob, _, _>(DeactivateSlackJob::JOB_TYPE, |job, deps| async move {
        handle_deactivate(job, deps).await
    });

    registry.register::<InviteSlackJob, _, _>(InviteSlackJob::JOB_TYPE, |job, deps| async move {
        handle_invite(job, deps).await
    });
}
