//! Slack domain - workspace account state and invitations.

pub mod effects;
pub mod jobs;

pub use jobs::{ActivateSlackJob, DeactivateSlackJob, InviteSlackJob};
