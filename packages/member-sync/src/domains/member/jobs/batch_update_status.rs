//! BatchUpdateStatusJob - apply one status to a set of members.

use serde::{Deserialize, Serialize};

use crate::common::MemberId;
use crate::domains::member::models::MemberStatus;
use crate::kernel::jobs::{CommandMeta, JobPriority};

/// Batch ceiling recommended for callers submitting large id lists.
pub const RECOMMENDED_BATCH_SIZE: usize = 10;

/// Job to write `status` for every member in `member_ids`, then emit one
/// [`StatusUpdatedJob`](super::StatusUpdatedJob) per member actually updated.
///
/// The handler does not chunk; callers split large lists themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateStatusJob {
    pub member_ids: Vec<MemberId>,
    pub status: MemberStatus,
    #[serde(default)]
    pub send_violation_email: bool,
}

impl BatchUpdateStatusJob {
    /// The job type identifier used in the jobs table.
    pub const JOB_TYPE: &'static str = "student.batch_update_status";

    pub fn new(member_ids: Vec<MemberId>, status: MemberStatus) -> Self {
        Self {
            member_ids,
            status,
            send_violation_email: false,
        }
    }

    pub fn with_violation_email(mut self, send: bool) -> Self {
        self.send_violation_email = send;
        self
    }
}

impl CommandMeta for BatchUpdateStatusJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn priority(&self) -> JobPriority {
        JobPriority::High
    }
}
