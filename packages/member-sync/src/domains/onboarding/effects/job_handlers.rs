//! Job handlers for the onboarding domain.

use std::sync::Arc;

use anyhow::Result;

use crate::domains::onboarding::activities;
use crate::domains::onboarding::jobs::OnboardingAttendedJob;
use crate::kernel::jobs::JobRegistry;
use crate::kernel::ServerDeps;

pub async fn handle_onboarding_attended(job: OnboardingAttendedJob, deps: Arc<ServerDeps>) -> Result<()> {
    activities::record_attendance(&job, &deps.db_pool).await
}

pub fn register_onboarding_jobs(registry: &mut JobRegistry) {
    registry.register::<OnboardingAttendedJob, _, _>(OnboardingAttendedJob::JOB_TYPE, |job, deps| async move {
        handle_onboarding_attended(job, deps).await
    });
}
