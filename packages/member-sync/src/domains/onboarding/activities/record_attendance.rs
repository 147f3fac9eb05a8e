use anyhow::Result;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::domains::onboarding::jobs::OnboardingAttendedJob;
use crate::domains::onboarding::models::OnboardingSession;

pub async fn record_attendance(job: &OnboardingAttendedJob, pool: &PgPool) -> Result<()> {
    let credited =
        OnboardingSession::credit_attendance(job.onboarding_session_id, &job.student_id, pool).await?;

    if credited {
        info!(
            session_id = %job.onboarding_session_id,
            student_id = %job.student_id,
            "onboarding attendance credited"
        );
    } else {
        debug!(
            session_id = %job.onboarding_session_id,
            student_id = %job.student_id,
            "attendance already credited"
        );
    }
    Ok(())
}
