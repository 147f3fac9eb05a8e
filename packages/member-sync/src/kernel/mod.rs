//! Kernel module - server infrastructure and dependencies.

pub mod airtable_client;
pub mod deps;
mod http;
pub mod jobs;
pub mod mailchimp_client;
pub mod postmark_client;
pub mod slack_client;
pub mod test_dependencies;
pub mod traits;

pub use airtable_client::AirtableClient;
pub use deps::{RecordsTable, ServerDeps};
pub use mailchimp_client::MailchimpClient;
pub use postmark_client::PostmarkClient;
pub use slack_client::{SlackAdminClient, SlackWebhookNotifier};
pub use test_dependencies::TestDependencies;
pub use traits::*;
