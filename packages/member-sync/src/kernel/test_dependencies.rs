// TestDependencies - mock implementations for testing
//
// Every mock records its calls and can be scripted to fail, so pipeline tests
// can assert exactly which side effects ran and exercise retry paths.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::deps::RecordsTable;
use super::jobs::testing::InMemoryJobQueue;
use super::{
    BaseChatDirectory, BaseEmailService, BaseInternalNotifier, BaseMailingListService,
    BaseRecordsService, ExternalServiceError, MailingListContact, NotificationWorkspace,
    ServerDeps,
};

pub const TEST_BASE_ID: &str = "appTestBase";
pub const TEST_TABLE_ID: &str = "tblMembers";

// =============================================================================
// Failure scripting
// =============================================================================

/// Scripted failures shared by the mocks: queued one-shot errors first, then
/// an optional error returned on every call.
#[derive(Default)]
pub struct FailureScript {
    queued: Mutex<VecDeque<ExternalServiceError>>,
    always: Mutex<Option<ExternalServiceError>>,
}

impl FailureScript {
    pub fn fail_next(&self, error: ExternalServiceError) {
        self.queued.lock().unwrap().push_back(error);
    }

    pub fn fail_always(&self, error: ExternalServiceError) {
        *self.always.lock().unwrap() = Some(error);
    }

    fn check(&self) -> Result<()> {
        if let Some(error) = self.queued.lock().unwrap().pop_front() {
            return Err(error.into());
        }
        match self.always.lock().unwrap().clone() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Mock Records Service
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub base_id: String,
    pub table_id: String,
    pub record_id: String,
    pub fields: serde_json::Value,
}

#[derive(Default)]
pub struct MockRecordsService {
    updates: Mutex<Vec<RecordUpdate>>,
    pub failures: FailureScript,
}

impl MockRecordsService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful updates only.
    pub fn updates(&self) -> Vec<RecordUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseRecordsService for MockRecordsService {
    async fn update_record(
        &self,
        base_id: &str,
        table_id: &str,
        record_id: &str,
        fields: serde_json::Value,
    ) -> Result<()> {
        self.failures.check()?;
        self.updates.lock().unwrap().push(RecordUpdate {
            base_id: base_id.to_string(),
            table_id: table_id.to_string(),
            record_id: record_id.to_string(),
            fields,
        });
        Ok(())
    }
}

// =============================================================================
// Mock Mailing List
// =============================================================================

#[derive(Default)]
pub struct MockMailingListService {
    added: Mutex<Vec<MailingListContact>>,
    removed: Mutex<Vec<String>>,
    pub failures: FailureScript,
}

impl MockMailingListService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn added(&self) -> Vec<MailingListContact> {
        self.added.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseMailingListService for MockMailingListService {
    async fn add_contact(&self, contact: &MailingListContact) -> Result<()> {
        self.failures.check()?;
        self.added.lock().unwrap().push(contact.clone());
        Ok(())
    }

    async fn remove_contact(&self, email: &str) -> Result<()> {
        self.failures.check()?;
        self.removed.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

// =============================================================================
// Mock Chat Directory
// =============================================================================

#[derive(Default)]
pub struct MockChatDirectory {
    activated: Mutex<Vec<String>>,
    deactivated: Mutex<Vec<String>>,
    invited: Mutex<Vec<String>>,
    pub failures: FailureScript,
}

impl MockChatDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activated(&self) -> Vec<String> {
        self.activated.lock().unwrap().clone()
    }

    pub fn deactivated(&self) -> Vec<String> {
        self.deactivated.lock().unwrap().clone()
    }

    pub fn invited(&self) -> Vec<String> {
        self.invited.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseChatDirectory for MockChatDirectory {
    async fn activate(&self, chat_id: &str) -> Result<()> {
        self.failures.check()?;
        self.activated.lock().unwrap().push(chat_id.to_string());
        Ok(())
    }

    async fn deactivate(&self, chat_id: &str) -> Result<()> {
        self.failures.check()?;
        self.deactivated.lock().unwrap().push(chat_id.to_string());
        Ok(())
    }

    async fn invite(&self, email: &str) -> Result<()> {
        self.failures.check()?;
        self.invited.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

// =============================================================================
// Mock Email Service
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub template_name: String,
    pub data: serde_json::Value,
}

#[derive(Default)]
pub struct MockEmailService {
    sent: Mutex<Vec<SentEmail>>,
    pub failures: FailureScript,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseEmailService for MockEmailService {
    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        self.failures.check()?;
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            template_name: template_name.to_string(),
            data,
        });
        Ok(())
    }
}

// =============================================================================
// Mock Internal Notifier
// =============================================================================

#[derive(Default)]
pub struct MockInternalNotifier {
    messages: Mutex<Vec<(String, NotificationWorkspace)>>,
    pub failures: FailureScript,
}

impl MockInternalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, NotificationWorkspace)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn messages_to(&self, workspace: NotificationWorkspace) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(_, w)| *w == workspace)
            .map(|(message, _)| message)
            .collect()
    }
}

#[async_trait]
impl BaseInternalNotifier for MockInternalNotifier {
    async fn send(&self, message: &str, workspace: NotificationWorkspace) -> Result<()> {
        self.failures.check()?;
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), workspace));
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Mock services plus an in-memory job queue, ready to become a [`ServerDeps`].
pub struct TestDependencies {
    pub jobs: Arc<InMemoryJobQueue>,
    pub records: Arc<MockRecordsService>,
    pub mailing_list: Arc<MockMailingListService>,
    pub chat: Arc<MockChatDirectory>,
    pub email: Arc<MockEmailService>,
    pub internal_notifier: Arc<MockInternalNotifier>,
    pub db_pool: Option<PgPool>,
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(InMemoryJobQueue::new()),
            records: Arc::new(MockRecordsService::new()),
            mailing_list: Arc::new(MockMailingListService::new()),
            chat: Arc::new(MockChatDirectory::new()),
            email: Arc::new(MockEmailService::new()),
            internal_notifier: Arc::new(MockInternalNotifier::new()),
            db_pool: None,
        }
    }

    /// Use a real database (integration tests).
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Build a `ServerDeps` sharing these mocks.
    ///
    /// Without a pool, a lazy pool that never connects is used; only code
    /// paths that skip the database may run against it. Must be called
    /// inside a Tokio runtime.
    pub fn server_deps(&self) -> Arc<ServerDeps> {
        let db_pool = self.db_pool.clone().unwrap_or_else(|| {
            PgPoolOptions::new()
                .connect_lazy("postgres://localhost/member_sync_unused")
                .expect("lazy pool url is valid")
        });

        Arc::new(ServerDeps::new(
            db_pool,
            self.jobs.clone(),
            self.records.clone(),
            self.mailing_list.clone(),
            self.chat.clone(),
            self.email.clone(),
            self.internal_notifier.clone(),
            RecordsTable {
                base_id: TEST_BASE_ID.to_string(),
                table_id: TEST_TABLE_ID.to_string(),
            },
        ))
    }

    pub fn into_server_deps(self) -> Arc<ServerDeps> {
        self.server_deps()
    }
}
