use serde::{Deserialize, Serialize};

use crate::kernel::jobs::CommandMeta;
use crate::kernel::MailingListContact;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContactJob {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl AddContactJob {
    pub const JOB_TYPE: &'static str = "mailchimp.add";

    pub fn contact(&self) -> MailingListContact {
        MailingListContact {
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

impl CommandMeta for AddContactJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveContactJob {
    pub email: String,
}

impl RemoveContactJob {
    pub const JOB_TYPE: &'static str = "mailchimp.remove";
}

impl CommandMeta for RemoveContactJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }
}
