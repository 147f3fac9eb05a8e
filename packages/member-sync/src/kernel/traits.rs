// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (what to do when a member's status changes) lives in domain
// functions that call through these traits.
//
// Naming convention: Base* for trait names (e.g., BaseRecordsService)

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// External service errors
// =============================================================================

/// Failure reported by a third-party service adapter.
///
/// `Transient` failures (rate limits, 5xx, network) are retried by the job
/// runner. `Rejected` failures (unknown user, invalid email) are terminal.
#[derive(Debug, Clone, Error)]
pub enum ExternalServiceError {
    #[error("{service} unavailable: {message}")]
    Transient { service: &'static str, message: String },

    #[error("{service} rejected request (HTTP {status}): {message}")]
    Rejected {
        service: &'static str,
        status: u16,
        message: String,
    },
}

impl ExternalServiceError {
    pub fn transient(service: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            service,
            message: message.into(),
        }
    }

    pub fn rejected(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            status,
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status: 429 and 5xx are transient, other codes are rejections.
    pub fn from_status(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        if status == 429 || status >= 500 {
            Self::transient(service, format!("HTTP {}: {}", status, body.into()))
        } else {
            Self::rejected(service, status, body)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

// =============================================================================
// Records Service Trait (Airtable)
// =============================================================================

#[async_trait]
pub trait BaseRecordsService: Send + Sync {
    /// Update the given fields of one record. Fields not named are left alone.
    async fn update_record(
        &self,
        base_id: &str,
        table_id: &str,
        record_id: &str,
        fields: serde_json::Value,
    ) -> Result<()>;
}

// =============================================================================
// Mailing List Trait (Mailchimp)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailingListContact {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[async_trait]
pub trait BaseMailingListService: Send + Sync {
    /// Subscribe a contact, updating it if already present.
    async fn add_contact(&self, contact: &MailingListContact) -> Result<()>;

    /// Remove a contact. Removing an absent contact succeeds.
    async fn remove_contact(&self, email: &str) -> Result<()>;
}

// =============================================================================
// Chat Directory Trait (Slack workspace membership)
// =============================================================================

#[async_trait]
pub trait BaseChatDirectory: Send + Sync {
    async fn activate(&self, chat_id: &str) -> Result<()>;

    async fn deactivate(&self, chat_id: &str) -> Result<()>;

    /// Invite an email address to the workspace. Already-invited is success.
    async fn invite(&self, email: &str) -> Result<()>;
}

// =============================================================================
// Email Trait (templated transactional email)
// =============================================================================

#[async_trait]
pub trait BaseEmailService: Send + Sync {
    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        data: serde_json::Value,
    ) -> Result<()>;
}

// =============================================================================
// Internal Notifier Trait (staff-facing chat channels)
// =============================================================================

/// Staff-facing notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationWorkspace {
    /// Membership changes for the team.
    Internal,
    /// Operational alerts (dead-lettered jobs).
    Alerts,
}

impl fmt::Display for NotificationWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationWorkspace::Internal => f.write_str("internal"),
            NotificationWorkspace::Alerts => f.write_str("alerts"),
        }
    }
}

#[async_trait]
pub trait BaseInternalNotifier: Send + Sync {
    async fn send(&self, message: &str, workspace: NotificationWorkspace) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(ExternalServiceError::from_status("airtable", 429, "slow down").is_transient());
        assert!(ExternalServiceError::from_status("airtable", 502, "bad gateway").is_transient());
    }

    #[test]
    fn client_errors_are_rejections() {
        let err = ExternalServiceError::from_status("mailchimp", 400, "Invalid Resource");
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "mailchimp rejected request (HTTP 400): Invalid Resource"
        );
    }

    #[test]
    fn workspace_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(NotificationWorkspace::Internal).unwrap(),
            serde_json::json!("internal")
        );
        assert_eq!(NotificationWorkspace::Alerts.to_string(), "alerts");
    }
}
