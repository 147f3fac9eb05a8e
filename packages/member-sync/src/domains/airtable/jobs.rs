use serde::{Deserialize, Serialize};

use crate::kernel::jobs::CommandMeta;

/// Overwrite fields of one record in the external record system.
///
/// Field values are absolute, so repeating the job is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordJob {
    #[serde(alias = "airtableBaseId")]
    pub base_id: String,
    #[serde(alias = "airtableTableId")]
    pub table_id: String,
    #[serde(alias = "airtableRecordId")]
    pub record_id: String,
    pub data: serde_json::Value,
}

impl UpdateRecordJob {
    pub const JOB_TYPE: &'static str = "airtable.record.update";
}

impl CommandMeta for UpdateRecordJob {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }
}
