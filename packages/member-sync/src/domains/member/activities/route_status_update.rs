use anyhow::Result;
use tracing::{error, info, warn};

use crate::common::PipelineError;
use crate::domains::member::jobs::StatusUpdatedJob;
use crate::domains::member::models::Member;
use crate::domains::member::routing::{
    plan_jobs, route_for, Contact, ContactSource, Skipped, StatusRoute,
};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Job types submitted, in routing order.
    pub submitted: Vec<&'static str>,
    pub skipped: Vec<Skipped>,
}

/// Fan one status change out into its side-effect jobs.
///
/// Side effects are only submitted here, never executed; a failure while
/// submitting fails the event so it is retried as a whole.
pub async fn route_status_update(event: &StatusUpdatedJob, deps: &ServerDeps) -> Result<RouteOutcome> {
    let (source, effects) = match route_for(event.status) {
        StatusRoute::Effects { source, effects } => (source, effects),
        StatusRoute::Reserved => {
            error!(
                student_id = %event.student_id,
                status = %event.status,
                "no side effects defined for status"
            );
            return Err(PipelineError::UnroutableStatus(event.status).into());
        }
    };

    let contact = match source {
        ContactSource::Snapshot => Contact::from_event(event),
        ContactSource::Current => {
            let member = Member::find_by_id(&event.student_id, &deps.db_pool)
                .await?
                .ok_or_else(|| PipelineError::MemberNotFound(event.student_id.clone()))?;
            Contact::from_current(event, member)
        }
    };

    let plan = plan_jobs(
        event.status,
        event.send_violation_email,
        &contact,
        effects,
        &deps.members_table,
    );

    for skipped in &plan.skipped {
        warn!(
            student_id = %event.student_id,
            effect = ?skipped.effect,
            reason = skipped.reason,
            "side effect skipped"
        );
    }

    let mut outcome = RouteOutcome {
        submitted: Vec::with_capacity(plan.jobs.len()),
        skipped: plan.skipped,
    };
    for job in plan.jobs {
        let job_type = job.job_type();
        job.submit(deps.jobs.as_ref()).await?;
        outcome.submitted.push(job_type);
    }

    info!(
        student_id = %event.student_id,
        status = %event.status,
        submitted = outcome.submitted.len(),
        "status change routed"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MemberId;
    use crate::domains::member::models::MemberStatus;
    use crate::domains::notification::SendEmailJob;
    use crate::kernel::TestDependencies;

    fn event(status: MemberStatus, slack_id: Option<&str>, violation: bool) -> StatusUpdatedJob {
        StatusUpdatedJob {
            student_id: MemberId::new("m1"),
            airtable_id: Some("rec1".into()),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            slack_id: slack_id.map(String::from),
            status,
            send_violation_email: violation,
        }
    }

    #[tokio::test]
    async fn inactive_submits_removal_jobs() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();

        let outcome = route_status_update(&event(MemberStatus::Inactive, Some("U1"), true), &deps)
            .await
            .unwrap();

        assert_eq!(outcome.submitted.len(), 5);
        let types: Vec<String> = test_deps.jobs.all().into_iter().map(|j| j.job_type).collect();
        assert_eq!(
            types,
            vec![
                "airtable.record.update",
                "mailchimp.remove",
                "notification.slack.send",
                "slack.deactivate",
                "notification.email.send",
            ]
        );
        let emails: Vec<SendEmailJob> = test_deps.jobs.payloads(SendEmailJob::JOB_TYPE).unwrap();
        assert_eq!(emails[0].to, "ada@example.com");
    }

    #[tokio::test]
    async fn bulk_removed_without_chat_id_submits_three_jobs() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();

        let outcome = route_status_update(&event(MemberStatus::BulkRemoved, None, false), &deps)
            .await
            .unwrap();

        assert_eq!(
            outcome.submitted,
            vec!["airtable.record.update", "mailchimp.remove", "notification.slack.send"]
        );
    }

    #[tokio::test]
    async fn banned_is_unroutable_and_submits_nothing() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.server_deps();

        let err = route_status_update(&event(MemberStatus::Banned, Some("U1"), true), &deps)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnroutableStatus(MemberStatus::Banned))
        ));
        assert!(test_deps.jobs.all().is_empty());
    }
}
