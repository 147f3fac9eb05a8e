//! Job handlers for the notification domain.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::domains::notification::jobs::{SendEmailJob, SendSlackNotificationJob};
use crate::kernel::jobs::JobRegistry;
use crate::kernel::ServerDeps;

pub async fn handle_send_email(job: SendEmailJob, deps: Arc<ServerDeps>) -> Result<()> {
    deps.email
        .send_template(&job.to, &job.template_name, job.data)
        .await
        .with_context(|| format!("sending {} email", job.template_name))?;

    info!(to = %job.to, template = %job.template_name, "email sent");
    Ok(())
}

pub async fn handle_send_slack_notification(
    job: SendSlackNotificationJob,
    deps: Arc<ServerDeps>,
) -> Result<()> {
    deps.internal_notifier
        .send(&job.message, job.workspace)
        .await
        .with_context(|| format!("posting to {} channel", job.workspace))?;

    info!(workspace = %job.workspace, "internal notification posted");
    Ok(())
}

pub fn register_notification_jobs(registry: &mut JobRegistry) {
    registry.register::<SendEmailJob, _, _>(SendEmailJob::JOB_TYPE, |job, deps| async move {
        handle_send_email(job, deps).await
    });

    registry.register::<SendSlackNotificationJob, _, _>(
        SendSlackNotificationJob::JOB_TYPE,
        |job, deps| async move { handle_send_slack_notification(job, deps).await },
    );
}
