//! Job handlers for the mailchimp domain.
//!
//! Both handlers are safe to repeat: adding is an upsert and removing an
//! absent contact succeeds.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::domains::mailchimp::jobs::{AddContactJob, RemoveContactJob};
use crate::kernel::jobs::JobRegistry;
use crate::kernel::ServerDeps;

pub async fn handle_add_contact(job: AddContactJob, deps: Arc<ServerDeps>) -> Result<()> {
    deps.mailing_list
        .add_contact(&job.contact())
        .await
        .with_context(|| format!("adding {} to mailing list", job.email))?;

    info!(email = %job.email, "added to mailing list");
    Ok(())
}

pub async fn handle_remove_contact(job: RemoveContactJob, deps: Arc<ServerDeps>) -> Result<()> {
    deps.mailing_list
        .remove_contact(&job.email)
        .await
        .with_context(|| format!("removing {} from mailing list", job.email))?;

    info!(email = %job.email, "removed from mailing list");
    Ok(())
}

pub fn register_mailchimp_jobs(registry: &mut JobRegistry) {
    registry.register::<AddContactJob, _, _>(AddContactJob::JOB_TYPE, |job, deps| async move {
        handle_add_contact(job, deps).await
    });

    registry.register::<RemoveContactJob, _, _>(RemoveContactJob::JOB_TYPE, |job, deps| async move {
        handle_remove_contact(job, deps).await
    });
}
