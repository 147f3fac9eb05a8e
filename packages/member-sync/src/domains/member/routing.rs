//! Status-keyed side-effect routing.
//!
//! Each status maps to a fixed, ordered list of side effects. Adding a status
//! means adding a row to [`route_for`]; the match is exhaustive, so a new
//! [`MemberStatus`] variant does not compile until it has a route (possibly
//! [`StatusRoute::Reserved`]).
//!
//! | Status         | Contact data | Side effects                                                          |
//! |----------------|--------------|-----------------------------------------------------------------------|
//! | `active`       | current row  | record update, engagement backfill, mailing list add, chat activate*   |
//! | `inactive`     | event        | record update, mailing list remove, internal notice, chat deactivate*, violation email** |
//! | `bulk_removed` | event        | same as `inactive`                                                    |
//! | `banned`       | -            | reserved: fails the event for operator review                         |
//!
//! \* only when the member has a chat id. \*\* only when requested.

use anyhow::Result;
use serde_json::json;

use crate::common::MemberId;
use crate::domains::airtable::UpdateRecordJob;
use crate::domains::mailchimp::{AddContactJob, RemoveContactJob};
use crate::domains::member::jobs::{EngagementBackfillJob, StatusUpdatedJob};
use crate::domains::member::models::{Member, MemberStatus};
use crate::domains::notification::{SendEmailJob, SendSlackNotificationJob};
use crate::domains::slack::{ActivateSlackJob, DeactivateSlackJob};
use crate::kernel::jobs::{EnqueueResult, JobQueue, JobQueueExt};
use crate::kernel::{NotificationWorkspace, RecordsTable};

pub const VIOLATION_EMAIL_TEMPLATE: &str = "student-removed";

const ORGANIZATION_NAME: &str = "ColorStack";

/// Where the router takes name and email from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactSource {
    /// Re-read the member row at dispatch time. Activation can happen long
    /// after the member's data was captured.
    Current,
    /// Use the data captured in the event at the moment of the write.
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    UpdateRecord,
    BackfillEngagement,
    AddToMailingList,
    RemoveFromMailingList,
    NotifyInternal,
    ActivateChat,
    DeactivateChat,
    SendViolationEmail,
}

/// Condition under which a side effect applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Always,
    HasChatId,
    ViolationEmailRequested,
}

impl SideEffect {
    pub fn gate(&self) -> Gate {
        match self {
            SideEffect::ActivateChat | SideEffect::DeactivateChat => Gate::HasChatId,
            SideEffect::SendViolationEmail => Gate::ViolationEmailRequested,
            _ => Gate::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRoute {
    Effects {
        source: ContactSource,
        effects: &'static [SideEffect],
    },
    /// Known status with no side effects defined yet.
    Reserved,
}

const ACTIVE_EFFECTS: &[SideEffect] = &[
    SideEffect::UpdateRecord,
    SideEffect::BackfillEngagement,
    SideEffect::AddToMailingList,
    SideEffect::ActivateChat,
];

const REMOVAL_EFFECTS: &[SideEffect] = &[
    SideEffect::UpdateRecord,
    SideEffect::RemoveFromMailingList,
    SideEffect::NotifyInternal,
    SideEffect::DeactivateChat,
    SideEffect::SendViolationEmail,
];

pub fn route_for(status: MemberStatus) -> StatusRoute {
    match status {
        MemberStatus::Active => StatusRoute::Effects {
            source: ContactSource::Current,
            effects: ACTIVE_EFFECTS,
        },
        MemberStatus::Inactive | MemberStatus::BulkRemoved => StatusRoute::Effects {
            source: ContactSource::Snapshot,
            effects: REMOVAL_EFFECTS,
        },
        MemberStatus::Banned => StatusRoute::Reserved,
    }
}

/// The member data side effects act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub member_id: MemberId,
    pub email: String,
    pub first_name: String,
    /// Only known when read from the member row.
    pub last_name: Option<String>,
    pub record_id: Option<String>,
    pub chat_id: Option<String>,
}

impl Contact {
    pub fn from_event(event: &StatusUpdatedJob) -> Self {
        Self {
            member_id: event.student_id.clone(),
            email: event.email.clone(),
            first_name: event.first_name.clone(),
            last_name: None,
            record_id: event.airtable_id.clone(),
            chat_id: event.slack_id.clone(),
        }
    }

    /// Name and email from the current row; correlation keys from the event.
    pub fn from_current(event: &StatusUpdatedJob, member: Member) -> Self {
        Self {
            member_id: member.id,
            email: member.email,
            first_name: member.first_name,
            last_name: Some(member.last_name),
            record_id: event.airtable_id.clone(),
            chat_id: event.slack_id.clone(),
        }
    }
}

/// A concrete side-effect job ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedJob {
    UpdateRecord(UpdateRecordJob),
    BackfillEngagement(EngagementBackfillJob),
    AddToMailingList(AddContactJob),
    RemoveFromMailingList(RemoveContactJob),
    NotifyInternal(SendSlackNotificationJob),
    ActivateChat(ActivateSlackJob),
    DeactivateChat(DeactivateSlackJob),
    SendViolationEmail(SendEmailJob),
}

impl PlannedJob {
    pub fn job_type(&self) -> &'static str {
        match self {
            PlannedJob::UpdateRecord(_) => UpdateRecordJob::JOB_TYPE,
            PlannedJob::BackfillEngagement(_) => EngagementBackfillJob::JOB_TYPE,
            PlannedJob::AddToMailingList(_) => AddContactJob::JOB_TYPE,
            PlannedJob::RemoveFromMailingList(_) => RemoveContactJob::JOB_TYPE,
            PlannedJob::NotifyInternal(_) => SendSlackNotificationJob::JOB_TYPE,
            PlannedJob::ActivateChat(_) => ActivateSlackJob::JOB_TYPE,
            PlannedJob::DeactivateChat(_) => DeactivateSlackJob::JOB_TYPE,
            PlannedJob::SendViolationEmail(_) => SendEmailJob::JOB_TYPE,
        }
    }

    pub async fn submit(self, jobs: &dyn JobQueue) -> Result<EnqueueResult> {
        match self {
            PlannedJob::UpdateRecord(job) => jobs.enqueue(job).await,
            PlannedJob::BackfillEngagement(job) => jobs.enqueue(job).await,
            PlannedJob::AddToMailingList(job) => jobs.enqueue(job).await,
            PlannedJob::RemoveFromMailingList(job) => jobs.enqueue(job).await,
            PlannedJob::NotifyInternal(job) => jobs.enqueue(job).await,
            PlannedJob::ActivateChat(job) => jobs.enqueue(job).await,
            PlannedJob::DeactivateChat(job) => jobs.enqueue(job).await,
            PlannedJob::SendViolationEmail(job) => jobs.enqueue(job).await,
        }
    }
}

/// A side effect that could not be planned for lack of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skipped {
    pub effect: SideEffect,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub jobs: Vec<PlannedJob>,
    pub skipped: Vec<Skipped>,
}

/// Turn a route's side effects into jobs for one member, applying gates.
pub fn plan_jobs(
    status: MemberStatus,
    send_violation_email: bool,
    contact: &Contact,
    effects: &[SideEffect],
    members_table: &RecordsTable,
) -> Plan {
    let mut plan = Plan::default();

    for &effect in effects {
        let applies = match effect.gate() {
            Gate::Always => true,
            Gate::HasChatId => contact.chat_id.is_some(),
            Gate::ViolationEmailRequested => send_violation_email,
        };
        if !applies {
            continue;
        }

        let job = match effect {
            SideEffect::UpdateRecord => match &contact.record_id {
                Some(record_id) => PlannedJob::UpdateRecord(UpdateRecordJob {
                    base_id: members_table.base_id.clone(),
                    table_id: members_table.table_id.clone(),
                    record_id: record_id.clone(),
                    data: json!({ "status": status.as_str() }),
                }),
                None => {
                    plan.skipped.push(Skipped {
                        effect,
                        reason: "member has no record id",
                    });
                    continue;
                }
            },
            SideEffect::BackfillEngagement => PlannedJob::BackfillEngagement(
                EngagementBackfillJob::new(contact.member_id.clone(), contact.email.clone()),
            ),
            SideEffect::AddToMailingList => PlannedJob::AddToMailingList(AddContactJob {
                email: contact.email.clone(),
                first_name: contact.first_name.clone(),
                last_name: contact.last_name.clone().unwrap_or_default(),
            }),
            SideEffect::RemoveFromMailingList => PlannedJob::RemoveFromMailingList(RemoveContactJob {
                email: contact.email.clone(),
            }),
            SideEffect::NotifyInternal => PlannedJob::NotifyInternal(SendSlackNotificationJob {
                message: removal_notice(&contact.email, status),
                workspace: NotificationWorkspace::Internal,
            }),
            SideEffect::ActivateChat | SideEffect::DeactivateChat => {
                // Gate guarantees presence.
                let Some(slack_id) = contact.chat_id.clone() else {
                    continue;
                };
                if effect == SideEffect::ActivateChat {
                    PlannedJob::ActivateChat(ActivateSlackJob { slack_id })
                } else {
                    PlannedJob::DeactivateChat(DeactivateSlackJob { slack_id })
                }
            }
            SideEffect::SendViolationEmail => PlannedJob::SendViolationEmail(SendEmailJob {
                to: contact.email.clone(),
                template_name: VIOLATION_EMAIL_TEMPLATE.to_string(),
                data: json!({ "firstName": contact.first_name }),
            }),
        };

        plan.jobs.push(job);
    }

    plan
}

/// Staff notice posted when a member leaves.
pub fn removal_notice(email: &str, status: MemberStatus) -> String {
    let outcome = match status {
        MemberStatus::BulkRemoved => "bulk removed",
        other => other.as_str(),
    };
    format!(
        "Member with the email \"{}\" has been marked as {} from {}.",
        email, outcome, ORGANIZATION_NAME
    )
}
