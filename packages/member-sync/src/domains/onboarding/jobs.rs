use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::MemberId;
use crate::kernel::jobs::CommandMeta;

/// Credit a member for attending an onboarding session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingAttendedJob {
    pub onboarding_session_id: Uuid,
    pub student_id: MemberId,
}

impl OnboardingAttendedJob {
    pub const JOB_TYPE: &'static str = "onboarding_session.attended";
}

impl CommandMeta for OnboardingAttendedJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(format!(
            "{}:{}:{}",
            Self::JOB_TYPE,
            self.onboarding_session_id,
            self.student_id
        ))
    }
}
