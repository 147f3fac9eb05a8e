//! Business domains. Each domain owns its job payloads and registers its
//! handlers with the shared [`JobRegistry`].

pub mod airtable;
pub mod mailchimp;
pub mod member;
pub mod notification;
pub mod onboarding;
pub mod slack;

use std::sync::Arc;

use crate::kernel::jobs::{JobRegistry, SharedJobRegistry};

/// Register every job handler in the pipeline.
pub fn register_all_jobs(registry: &mut JobRegistry) {
    member::effects::register_member_jobs(registry);
    airtable::effects::register_airtable_jobs(registry);
    mailchimp::effects::register_mailchimp_jobs(registry);
    slack::effects::register_slack_jobs(registry);
    notification::effects::register_notification_jobs(registry);
    onboarding::effects::register_onboarding_jobs(registry);
}

pub fn build_job_registry() -> SharedJobRegistry {
    let mut registry = JobRegistry::new();
    register_all_jobs(&mut registry);
    Arc::new(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pipeline_job_has_a_handler() {
        let registry = build_job_registry();
        assert_eq!(
            registry.registered_types(),
            vec![
                "airtable.record.update",
                "mailchimp.add",
                "mailchimp.remove",
                "notification.email.send",
                "notification.slack.send",
                "onboarding_session.attended",
                "slack.activate",
                "slack.deactivate",
                "slack.invite",
                "student.batch_update_status",
                "student.engagement.backfill",
                "student.status_updated",
            ]
        );
    }
}
