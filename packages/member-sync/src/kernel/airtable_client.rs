//! Airtable REST client (record updates only).

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::http::{ensure_success, transport_error};
use super::BaseRecordsService;

const SERVICE: &str = "airtable";
const BASE_URL: &str = "https://api.airtable.com/v0";

pub struct AirtableClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AirtableClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
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
impl BaseRecordsService for AirtableClient {
    async fn update_record(
        &self,
        base_id: &str,
        table_id: &str,
        record_id: &str,
        fields: serde_json::Value,
    ) -> Result<()> {
        let url = format!("{}/{}/{}/{}", self.base_url, base_id, table_id, record_id);

        let resp = self
            .client
            .patch(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        ensure_success(SERVICE, resp).await?;

        debug!(base_id, table_id, record_id, "airtable record updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::ExternalServiceError;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn patches_record_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/appBase/tblMembers/rec1"))
            .and(header("authorization", "Bearer key"))
            .and(body_json(json!({"fields": {"status": "inactive"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "rec1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = AirtableClient::new("key".into()).with_base_url(server.uri());
        client
            .update_record("appBase", "tblMembers", "rec1", json!({"status": "inactive"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_record_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404).set_body_string("NOT_FOUND"))
            .mount(&server)
            .await;

        let client = AirtableClient::new("key".into()).with_base_url(server.uri());
        let err = client
            .update_record("appBase", "tblMembers", "missing", json!({}))
            .await
            .unwrap_err();
        let external = err.downcast_ref::<ExternalServiceError>().unwrap();
        assert!(!external.is_transient());
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = AirtableClient::new("key".into()).with_base_url(server.uri());
        let err = client
            .update_record("appBase", "tblMembers", "rec1", json!({}))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ExternalServiceError>().unwrap().is_transient());
    }
}
