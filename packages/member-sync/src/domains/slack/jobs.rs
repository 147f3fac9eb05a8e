use serde::{Deserialize, Serialize};

use crate::kernel::jobs::CommandMeta;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateSlackJob {
    pub slack_id: String,
}

impl ActivateSlackJob {
    pub const JOB_TYPE: &'static str = "slack.activate";
}

impl CommandMeta for ActivateSlackJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateSlackJob {
    pub slack_id: String,
}

impl DeactivateSlackJob {
    pub const JOB_TYPE: &'static str = "slack.deactivate";
}

impl CommandMeta for DeactivateSlackJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteSlackJob {
    pub email: String,
}

impl InviteSlackJob {
    pub const JOB_TYPE: &'static str = "slack.invite";
}

impl CommandMeta for InviteSlackJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(format!("{}:{}", Self::JOB_TYPE, self.email.to_lowercase()))
    }
}
