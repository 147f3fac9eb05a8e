//! Mailchimp domain - mailing list membership.

pub mod effects;
pub mod jobs;

pub use jobs::{AddContactJob, RemoveContactJob};
