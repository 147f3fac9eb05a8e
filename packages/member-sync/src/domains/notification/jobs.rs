use serde::{Deserialize, Serialize};

use crate::kernel::jobs::CommandMeta;
use crate::kernel::NotificationWorkspace;

/// Send a templated email to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailJob {
    pub to: String,
    #[serde(alias = "name")]
    pub template_name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SendEmailJob {
    pub const JOB_TYPE: &'static str = "notification.email.send";
}

impl CommandMeta for SendEmailJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }
}

/// Post a message to a staff-facing channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSlackNotificationJob {
    pub message: String,
    pub workspace: NotificationWorkspace,
}

impl SendSlackNotificationJob {
    pub const JOB_TYPE: &'static str = "notification.slack.send";
}

impl CommandMeta for SendSlackNotificationJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }
}
