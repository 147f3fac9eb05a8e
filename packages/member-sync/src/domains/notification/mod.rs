//! Notification domain - member email and staff channel messages.

pub mod effects;
pub mod jobs;

pub use jobs::{SendEmailJob, SendSlackNotificationJob};
