//! Slack clients: workspace administration and incoming-webhook notifications.
//!
//! Account activation goes through the SCIM API, invitations through the
//! `admin.users.invite` Web API method. The Web API answers `200` even on
//! failure and reports the outcome in the `ok` / `error` fields.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::http::{ensure_success, transport_error};
use super::{BaseChatDirectory, BaseInternalNotifier, ExternalServiceError, NotificationWorkspace};

const SERVICE: &str = "slack";
const SCIM_URL: &str = "https://api.slack.com/scim/v1";
const WEB_API_URL: &str = "https://slack.com/api";

/// Invite outcomes that mean the person is already where we want them.
const ALREADY_MEMBER_ERRORS: &[&str] = &["already_in_team", "already_invited", "already_in_team_invited_user"];

#[derive(Debug, Deserialize)]
struct WebApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackAdminClient {
    client: reqwest::Client,
    token: String,
    team_id: String,
    invite_channel_ids: Vec<String>,
    scim_url: String,
    web_api_url: String,
}

impl SlackAdminClient {
    pub fn new(token: String, team_id: String, invite_channel_ids: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            team_id,
            invite_channel_ids,
            scim_url: SCIM_URL.to_string(),
            web_api_url: WEB_API_URL.to_string(),
        }
    }

    /// Point both APIs at another host (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.scim_url = format!("{}/scim/v1", base_url);
        self.web_api_url = format!("{}/api", base_url);
        self
    }

    async fn set_active(&self, chat_id: &str, active: bool) -> Result<()> {
        let url = format!("{}/Users/{}", self.scim_url, chat_id);
        let body = json!({
            "schemas": ["urn:scim:schemas:core:1.0"],
            "active": active,
        });

        let resp = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        ensure_success(SERVICE, resp).await?;

        debug!(chat_id, active, "slack account updated");
        Ok(())
    }
}

#[async_trait]
impl BaseChatDirectory for SlackAdminClient {
    async fn activate(&self, chat_id: &str) -> Result<()> {
        self.set_active(chat_id, true).await
    }

    async fn deactivate(&self, chat_id: &str) -> Result<()> {
        self.set_active(chat_id, false).await
    }

    async fn invite(&self, email: &str) -> Result<()> {
        let url = format!("{}/admin.users.invite", self.web_api_url);
        let channel_ids = self.invite_channel_ids.join(",");
        let form = [
            ("team_id", self.team_id.as_str()),
            ("email", email),
            ("channel_ids", channel_ids.as_str()),
        ];

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let resp = ensure_success(SERVICE, resp).await?;
        let status = resp.status().as_u16();
        let body: WebApiResponse = resp.json().await.map_err(|e| transport_error(SERVICE, e))?;

        if body.ok {
            debug!(email, "slack invitation sent");
            return Ok(());
        }

        match body.error.as_deref() {
            Some(error) if ALREADY_MEMBER_ERRORS.contains(&error) => {
                debug!(email, error, "slack invitation not needed");
                Ok(())
            }
            Some("ratelimited") => Err(ExternalServiceError::transient(SERVICE, "ratelimited").into()),
            other => Err(ExternalServiceError::rejected(
                SERVICE,
                status,
                other.unwrap_or("unknown_error").to_string(),
            )
            .into()),
        }
    }
}

/// Posts plain-text messages to Slack incoming webhooks.
///
/// Without a dedicated alerts webhook, alerts go to the internal channel.
pub struct SlackWebhookNotifier {
    client: reqwest::Client,
    internal_url: String,
    alerts_url: Option<String>,
}

impl SlackWebhookNotifier {
    pub fn new(internal_url: String, alerts_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            internal_url,
            alerts_url,
        }
    }

    fn url_for(&self, workspace: NotificationWorkspace) -> &str {
        match workspace {
            NotificationWorkspace::Internal => &self.internal_url,
            NotificationWorkspace::Alerts => self.alerts_url.as_deref().unwrap_or(&self.internal_url),
        }
    }
}

#[async_trait]
impl BaseInternalNotifier for SlackWebhookNotifier {
    async fn send(&self, message: &str, workspace: NotificationWorkspace) -> Result<()> {
        let resp = self
            .client
            .post(self.url_for(workspace))
            .json(&json!({ "text": message }))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        ensure_success(SERVICE, resp).await?;

        debug!(workspace = %workspace, "slack notification posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn admin(server: &MockServer) -> SlackAdminClient {
        SlackAdminClient::new("xoxp".into(), "T1".into(), vec!["C1".into()]).with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn deactivate_patches_scim_user() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/scim/v1/Users/U123"))
            .and(body_json(json!({
                "schemas": ["urn:scim:schemas:core:1.0"],
                "active": false,
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        admin(&server).deactivate("U123").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404).set_body_string("user_not_found"))
            .mount(&server)
            .await;

        let err = admin(&server).activate("U404").await.unwrap_err();
        assert!(!err.downcast_ref::<ExternalServiceError>().unwrap().is_transient());
    }

    #[tokio::test]
    async fn invite_treats_existing_member_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin.users.invite"))
            .and(body_string_contains("email=ada%40example.com"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "already_in_team"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        admin(&server).invite("ada@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn invite_failure_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "invalid_email"})),
            )
            .mount(&server)
            .await;

        let err = admin(&server).invite("nope").await.unwrap_err();
        let external = err.downcast_ref::<ExternalServiceError>().unwrap();
        assert!(!external.is_transient());
        assert!(external.to_string().contains("invalid_email"));
    }

    #[tokio::test]
    async fn alerts_fall_back_to_internal_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal"))
            .and(body_json(json!({"text": "job dead"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackWebhookNotifier::new(format!("{}/internal", server.uri()), None);
        notifier.send("job dead", NotificationWorkspace::Alerts).await.unwrap();
    }

    #[tokio::test]
    async fn alerts_use_dedicated_webhook_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackWebhookNotifier::new(
            format!("{}/internal", server.uri()),
            Some(format!("{}/alerts", server.uri())),
        );
        notifier.send("job dead", NotificationWorkspace::Alerts).await.unwrap();
    }
}
