//! Airtable domain - keeps the external member records in sync.

pub mod effects;
pub mod jobs;

pub use jobs::UpdateRecordJob;
