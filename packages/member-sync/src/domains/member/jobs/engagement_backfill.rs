use serde::{Deserialize, Serialize};

use crate::common::MemberId;
use crate::kernel::jobs::{CommandMeta, JobPriority};

/// Link engagement recorded by email before the member existed (or while
/// they were removed) back to the member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementBackfillJob {
    pub student_id: MemberId,
    pub email: String,
}

impl EngagementBackfillJob {
    pub const JOB_TYPE: &'static str = "student.engagement.backfill";

    pub fn new(student_id: MemberId, email: impl Into<String>) -> Self {
        Self {
            student_id,
            email: email.into(),
        }
    }
}

impl CommandMeta for EngagementBackfillJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn priority(&self) -> JobPriority {
        JobPriority::Low
    }
}
