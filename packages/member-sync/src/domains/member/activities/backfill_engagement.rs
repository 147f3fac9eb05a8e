use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::domains::member::jobs::EngagementBackfillJob;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillOutcome {
    pub event_attendees: u64,
    pub survey_responses: u64,
}

/// Attach engagement recorded under the member's email to the member.
///
/// Only rows without a member are touched, so running it twice links
/// nothing new.
pub async fn backfill_engagement(job: &EngagementBackfillJob, pool: &PgPool) -> Result<BackfillOutcome> {
    let mut tx = pool.begin().await?;

    let event_attendees = sqlx::query(
        "UPDATE event_attendees
         SET student_id = $1
         WHERE LOWER(email) = LOWER($2) AND student_id IS NULL",
    )
    .bind(&job.student_id)
    .bind(job.email.trim())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let survey_responses = sqlx::query(
        "UPDATE survey_responses
         SET student_id = $1
         WHERE LOWER(email) = LOWER($2) AND student_id IS NULL",
    )
    .bind(&job.student_id)
    .bind(job.email.trim())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    info!(
        student_id = %job.student_id,
        event_attendees,
        survey_responses,
        "engagement backfilled"
    );

    Ok(BackfillOutcome {
        event_attendees,
        survey_responses,
    })
}
