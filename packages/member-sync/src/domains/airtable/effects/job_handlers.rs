//! Job handlers for the airtable domain.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::domains::airtable::jobs::UpdateRecordJob;
use crate::kernel::jobs::JobRegistry;
use crate::kernel::ServerDeps;

pub async fn handle_update_record(job: UpdateRecordJob, deps: Arc<ServerDeps>) -> Result<()> {
    deps.records
        .update_record(&job.base_id, &job.table_id, &job.record_id, job.data)
        .await
        .with_context(|| format!("updating record {}", job.record_id))?;

    info!(record_id = %job.record_id, table_id = %job.table_id, "record updated");
    Ok(())
}

pub fn register_airtable_jobs(registry: &mut JobRegistry) {
    registry.register::<UpdateRecordJob, _, _>(UpdateRecordJob::JOB_TYPE, |job, deps| async move {
        handle_update_record(job, deps).await
    });
}
