//! Onboarding session upload.
//!
//! Showing up to onboarding reactivates a bulk-removed member. The status
//! itself is never written here: a single-member batch update to ACTIVE is
//! submitted, which keeps the batch updater the only status writer.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::common::{MemberId, PipelineError};
use crate::domains::member::jobs::BatchUpdateStatusJob;
use crate::domains::member::models::MemberStatus;
use crate::domains::onboarding::jobs::OnboardingAttendedJob;
use crate::domains::onboarding::models::{OnboardingAttendee, OnboardingSession};
use crate::domains::slack::InviteSlackJob;
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::ServerDeps;

/// What was submitted for one attendee besides attendance credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendeeAction {
    Reactivated,
    InvitedToChat,
    None,
}

impl AttendeeAction {
    pub fn for_attendee(attendee: &OnboardingAttendee) -> Self {
        if attendee.status == MemberStatus::BulkRemoved {
            AttendeeAction::Reactivated
        } else if attendee.slack_id.is_none() {
            AttendeeAction::InvitedToChat
        } else {
            AttendeeAction::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedSession {
    pub session_id: Uuid,
    pub attendees: Vec<(MemberId, AttendeeAction)>,
}

/// Store a session with its attendees, then submit follow-up jobs.
///
/// The session, attendee rows, and `onboarded_at` stamps commit together.
/// Every attendee must exist.
pub async fn upload_session(
    date: NaiveDate,
    uploaded_by_id: &str,
    attendee_ids: Vec<MemberId>,
    deps: &ServerDeps,
) -> Result<UploadedSession> {
    let mut attendee_ids = attendee_ids;
    attendee_ids.sort();
    attendee_ids.dedup();

    let session = OnboardingSession::new(date, uploaded_by_id);
    let mut tx = deps.db_pool.begin().await?;

    let attendees = OnboardingAttendee::find_by_ids(&attendee_ids, &mut *tx).await?;
    if let Some(missing) = attendee_ids
        .iter()
        .find(|id| !attendees.iter().any(|a| &a.id == *id))
    {
        return Err(PipelineError::MemberNotFound(missing.clone()).into());
    }

    session.insert(&mut *tx).await?;
    let newly_onboarded = session.mark_onboarded(&attendee_ids, &mut *tx).await?;
    session.add_attendees(&attendee_ids, &mut *tx).await?;
    tx.commit().await?;

    let mut actions = Vec::with_capacity(attendees.len());
    for attendee in attendees {
        let action = AttendeeAction::for_attendee(&attendee);
        match action {
            AttendeeAction::Reactivated => {
                deps.jobs
                    .enqueue(BatchUpdateStatusJob::new(vec![attendee.id.clone()], MemberStatus::Active))
                    .await?;
            }
            AttendeeAction::InvitedToChat => {
                deps.jobs
                    .enqueue(InviteSlackJob {
                        email: attendee.email.clone(),
                    })
                    .await?;
            }
            AttendeeAction::None => {}
        }

        deps.jobs
            .enqueue(OnboardingAttendedJob {
                onboarding_session_id: session.id,
                student_id: attendee.id.clone(),
            })
            .await?;

        actions.push((attendee.id, action));
    }

    info!(
        session_id = %session.id,
        date = %date,
        attendees = actions.len(),
        newly_onboarded,
        "onboarding session uploaded"
    );

    Ok(UploadedSession {
        session_id: session.id,
        attendees: actions,
    })
}
