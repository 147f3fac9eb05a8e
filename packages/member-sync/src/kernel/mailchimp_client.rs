//! Mailchimp Marketing API client for a single audience.
//!
//! Audience members are addressed by the MD5 hash of the lowercased email,
//! which makes both operations idempotent: `add_contact` is an upsert and
//! removing an absent member is treated as success.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use super::http::{ensure_success, transport_error};
use super::{BaseMailingListService, MailingListContact};

const SERVICE: &str = "mailchimp";

pub struct MailchimpClient {
    client: reqwest::Client,
    api_key: String,
    audience_id: String,
    base_url: String,
}

impl MailchimpClient {
    pub fn new(api_key: String, server_prefix: &str, audience_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            audience_id,
            base_url: format!("https://{}.api.mailchimp.com/3.0", server_prefix),
        }
    }

    /// Point the client at another host (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn member_url(&self, email: &str) -> String {
        format!(
            "{}/lists/{}/members/{}",
            self.base_url,
            self.audience_id,
            subscriber_hash(email)
        )
    }
}

/// Mailchimp's member key: hex MD5 of the lowercased address.
pub fn subscriber_hash(email: &str) -> String {
    format!("{:x}", md5::compute(email.trim().to_lowercase().as_bytes()))
}

#[async_trait]
impl BaseMailingListService for MailchimpClient {
    async fn add_contact(&self, contact: &MailingListContact) -> Result<()> {
        let body = json!({
            "email_address": contact.email,
            "status_if_new": "subscribed",
            "merge_fields": {
                "FNAME": contact.first_name,
                "LNAME": contact.last_name,
            },
        });

        let resp = self
            .client
            .put(self.member_url(&contact.email))
            .basic_auth("member-sync", Some(&self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        ensure_success(SERVICE, resp).await?;

        debug!(email = %contact.email, "mailchimp contact upserted");
        Ok(())
    }

    async fn remove_contact(&self, email: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.member_url(email))
            .basic_auth("member-sync", Some(&self.api_key))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(email, "mailchimp contact already absent");
            return Ok(());
        }

        ensure_success(SERVICE, resp).await?;

        debug!(email, "mailchimp contact removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::ExternalServiceError;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> MailchimpClient {
        MailchimpClient::new("key-us1".into(), "us1", "aud".into()).with_base_url(server.uri())
    }

    #[test]
    fn hash_ignores_case_and_whitespace() {
        assert_eq!(subscriber_hash("Ada@Example.com "), subscriber_hash("ada@example.com"));
        assert_eq!(subscriber_hash("ada@example.com").len(), 32);
    }

    #[tokio::test]
    async fn add_upserts_by_hash() {
        let server = MockServer::start().await;
        let hash = subscriber_hash("ada@example.com");
        Mock::given(method("PUT"))
            .and(path(format!("/lists/aud/members/{}", hash)))
            .and(body_partial_json(json!({
                "email_address": "ada@example.com",
                "status_if_new": "subscribed",
                "merge_fields": {"FNAME": "Ada", "LNAME": "Lovelace"},
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .add_contact(&MailingListContact {
                email: "ada@example.com".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn removing_absent_contact_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).remove_contact("gone@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn removing_twice_is_idempotent() {
        let server = MockServer::start().await;
        let member_path = format!("/lists/aud/members/{}", subscriber_hash("ada@example.com"));
        Mock::given(method("DELETE"))
            .and(path(member_path.clone()))
            .respond_with(ResponseTemplate::new(204))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(member_path))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client.remove_contact("ada@example.com").await.unwrap();
        client.remove_contact("Ada@Example.com").await.unwrap();
    }

    #[tokio::test]
    async fn invalid_address_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid Resource"))
            .mount(&server)
            .await;

        let err = client(&server)
            .add_contact(&MailingListContact {
                email: "bad".into(),
                first_name: "B".into(),
                last_name: "A".into(),
            })
            .await
            .unwrap_err();
        assert!(!err.downcast_ref::<ExternalServiceError>().unwrap().is_transient());
    }
}
