//! Postmark templated email client.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::http::{ensure_success, transport_error};
use super::BaseEmailService;

const SERVICE: &str = "postmark";
const BASE_URL: &str = "https://api.postmarkapp.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TemplatedEmail<'a> {
    from: &'a str,
    to: &'a str,
    template_alias: &'a str,
    template_model: serde_json::Value,
}

pub struct PostmarkClient {
    client: reqwest::Client,
    server_token: String,
    from_address: String,
    base_url: String,
}

impl PostmarkClient {
    pub fn new(server_token: String, from_address: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_token,
            from_address,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at another host (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl BaseEmailService for PostmarkClient {
    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let email = TemplatedEmail {
            from: &self.from_address,
            to,
            template_alias: template_name,
            template_model: data,
        };

        let resp = self
            .client
            .post(format!("{}/email/withTemplate", self.base_url))
            .header("X-Postmark-Server-Token", &self.server_token)
            .header("Accept", "application/json")
            .json(&email)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        ensure_success(SERVICE, resp).await?;

        debug!(to, template = template_name, "templated email sent");
        Ok(())
    }
}
