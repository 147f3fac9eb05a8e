//! Server dependencies for job handlers and activities (using traits for testability)
//!
//! Every external service sits behind a `Base*` trait so tests can swap in
//! the recording mocks from [`TestDependencies`](super::TestDependencies).

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::kernel::jobs::JobQueue;
use crate::kernel::{
    AirtableClient, BaseChatDirectory, BaseEmailService, BaseInternalNotifier,
    BaseMailingListService, BaseRecordsService, MailchimpClient, PostmarkClient, SlackAdminClient,
    SlackWebhookNotifier,
};

/// Where member records live in the external record system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordsTable {
    pub base_id: String,
    pub table_id: String,
}

/// Server dependencies accessible to handlers (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub jobs: Arc<dyn JobQueue>,
    pub records: Arc<dyn BaseRecordsService>,
    pub mailing_list: Arc<dyn BaseMailingListService>,
    pub chat: Arc<dyn BaseChatDirectory>,
    pub email: Arc<dyn BaseEmailService>,
    pub internal_notifier: Arc<dyn BaseInternalNotifier>,
    /// Table holding one record per member
    pub members_table: RecordsTable,
}

impl ServerDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: PgPool,
        jobs: Arc<dyn JobQueue>,
        records: Arc<dyn BaseRecordsService>,
        mailing_list: Arc<dyn BaseMailingListService>,
        chat: Arc<dyn BaseChatDirectory>,
        email: Arc<dyn BaseEmailService>,
        internal_notifier: Arc<dyn BaseInternalNotifier>,
        members_table: RecordsTable,
    ) -> Self {
        Self {
            db_pool,
            jobs,
            records,
            mailing_list,
            chat,
            email,
            internal_notifier,
            members_table,
        }
    }

    /// Wire the production vendor clients from configuration.
    pub fn from_config(config: &Config, db_pool: PgPool, jobs: Arc<dyn JobQueue>) -> Self {
        Self::new(
            db_pool,
            jobs,
            Arc::new(AirtableClient::new(config.airtable_api_key.clone())),
            Arc::new(MailchimpClient::new(
                config.mailchimp_api_key.clone(),
                &config.mailchimp_server_prefix,
                config.mailchimp_audience_id.clone(),
            )),
            Arc::new(SlackAdminClient::new(
                config.slack_admin_token.clone(),
                config.slack_team_id.clone(),
                config.slack_invite_channel_ids.clone(),
            )),
            Arc::new(PostmarkClient::new(
                config.postmark_api_token.clone(),
                config.email_from_address.clone(),
            )),
            Arc::new(SlackWebhookNotifier::new(
                config.slack_internal_webhook_url.clone(),
                config.slack_alerts_webhook_url.clone(),
            )),
            RecordsTable {
                base_id: config.airtable_family_base_id.clone(),
                table_id: config.airtable_members_table_id.clone(),
            },
        )
    }
}
