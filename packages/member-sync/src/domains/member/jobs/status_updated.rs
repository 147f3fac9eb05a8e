//! StatusUpdatedJob - the per-member status change event.

use serde::{Deserialize, Serialize};

use crate::common::MemberId;
use crate::domains::member::models::{MemberStatus, UpdatedMember};
use crate::kernel::jobs::CommandMeta;

/// One member's status changed. Carries the correlation data captured at
/// the moment of the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatedJob {
    pub student_id: MemberId,
    pub airtable_id: Option<String>,
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub slack_id: Option<String>,
    pub status: MemberStatus,
    #[serde(default)]
    pub send_violation_email: bool,
}

impl StatusUpdatedJob {
    pub const JOB_TYPE: &'static str = "student.status_updated";

    pub fn from_update(member: UpdatedMember, status: MemberStatus, send_violation_email: bool) -> Self {
        Self {
            student_id: member.id,
            airtable_id: member.airtable_id,
            email: member.email,
            first_name: member.first_name,
            slack_id: member.slack_id,
            status,
            send_violation_email,
        }
    }
}

impl CommandMeta for StatusUpdatedJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }
}
