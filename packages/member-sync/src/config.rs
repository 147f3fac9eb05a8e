use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,

    // Airtable (external record system)
    pub airtable_api_key: String,
    pub airtable_family_base_id: String,
    pub airtable_members_table_id: String,

    // Mailchimp (mailing list)
    pub mailchimp_api_key: String,
    pub mailchimp_server_prefix: String,
    pub mailchimp_audience_id: String,

    // Slack (chat workspace + internal notifications)
    pub slack_admin_token: String,
    pub slack_team_id: String,
    pub slack_internal_webhook_url: String,
    pub slack_alerts_webhook_url: Option<String>,
    /// Channels new invitees join, comma separated in the environment.
    pub slack_invite_channel_ids: Vec<String>,

    // Postmark (transactional email)
    pub postmark_api_token: String,
    pub email_from_address: String,

    // Job worker tuning
    pub job_worker_batch_size: i64,
    pub job_worker_poll_interval_ms: u64,
    pub job_max_retries: i32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or("PORT", 8080)?,
            airtable_api_key: env::var("AIRTABLE_API_KEY")
                .context("AIRTABLE_API_KEY must be set")?,
            airtable_family_base_id: env::var("AIRTABLE_FAMILY_BASE_ID")
                .context("AIRTABLE_FAMILY_BASE_ID must be set")?,
            airtable_members_table_id: env::var("AIRTABLE_MEMBERS_TABLE_ID")
                .context("AIRTABLE_MEMBERS_TABLE_ID must be set")?,
            mailchimp_api_key: env::var("MAILCHIMP_API_KEY")
                .context("MAILCHIMP_API_KEY must be set")?,
            mailchimp_server_prefix: env::var("MAILCHIMP_SERVER_PREFIX")
                .context("MAILCHIMP_SERVER_PREFIX must be set")?,
            mailchimp_audience_id: env::var("MAILCHIMP_AUDIENCE_ID")
                .context("MAILCHIMP_AUDIENCE_ID must be set")?,
            slack_admin_token: env::var("SLACK_ADMIN_TOKEN")
                .context("SLACK_ADMIN_TOKEN must be set")?,
            slack_team_id: env::var("SLACK_TEAM_ID").context("SLACK_TEAM_ID must be set")?,
            slack_internal_webhook_url: env::var("SLACK_INTERNAL_WEBHOOK_URL")
                .context("SLACK_INTERNAL_WEBHOOK_URL must be set")?,
            slack_alerts_webhook_url: env::var("SLACK_ALERTS_WEBHOOK_URL").ok(),
            slack_invite_channel_ids: env::var("SLACK_INVITE_CHANNEL_IDS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            postmark_api_token: env::var("POSTMARK_API_TOKEN")
                .context("POSTMARK_API_TOKEN must be set")?,
            email_from_address: env::var("EMAIL_FROM_ADDRESS")
                .context("EMAIL_FROM_ADDRESS must be set")?,
            job_worker_batch_size: parse_or("JOB_WORKER_BATCH_SIZE", 10)?,
            job_worker_poll_interval_ms: parse_or("JOB_WORKER_POLL_INTERVAL_MS", 1000)?,
            job_max_retries: parse_or("JOB_MAX_RETRIES", 3)?,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}
