//! Test harness with testcontainers for integration testing.
//!
//! One Postgres container is shared by every test. Each harness gets its own
//! freshly migrated database inside it, so tests that drain the `jobs` table
//! never see each other's rows.

use std::sync::Arc;

use anyhow::{Context, Result};
use member_sync::domains::build_job_registry;
use member_sync::kernel::jobs::{JobQueue, JobRunner, JobRunnerConfig};
use member_sync::kernel::{ServerDeps, TestDependencies};
use sqlx::{Connection, PgConnection, PgPool};
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    host: String,
    port: u16,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

/// Global shared infrastructure - initialized once, reused by all tests.
static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let host = postgres.get_host().await?.to_string();
        let port = postgres.get_host_port_ipv4(5432).await?;

        Ok(Self {
            host,
            port,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }

    fn url(&self, database: &str) -> String {
        format!(
            "postgresql://postgres:postgres@{}:{}/{}",
            self.host, self.port, database
        )
    }
}

/// Test harness: a private migrated database plus recording mocks.
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let deps = ctx.deps();
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    pub db_pool: PgPool,
    pub mocks: TestDependencies,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let database = format!("test_{}", Uuid::new_v4().simple());
        let mut admin = PgConnection::connect(&infra.url("postgres"))
            .await
            .context("Failed to connect to admin database")?;
        sqlx::query(&format!("CREATE DATABASE {database}"))
            .execute(&mut admin)
            .await
            .context("Failed to create test database")?;
        admin.close().await?;

        let db_pool = PgPool::connect(&infra.url(&database))
            .await
            .context("Failed to connect to test database")?;
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run migrations")?;

        let mocks = TestDependencies::new().with_pool(db_pool.clone());

        Ok(Self { db_pool, mocks })
    }

    /// Server dependencies wired to the test database and mocks.
    pub fn deps(&self) -> Arc<ServerDeps> {
        self.mocks.server_deps()
    }

    /// A job runner over the in-memory queue with every handler registered.
    pub fn runner(&self) -> JobRunner {
        let queue: Arc<dyn JobQueue> = self.mocks.jobs.clone();
        JobRunner::with_config(
            queue,
            build_job_registry(),
            self.deps(),
            JobRunnerConfig::with_worker_id("test-runner"),
        )
    }

    /// Run every ready job, including jobs they submit, until none are left.
    pub async fn drain(&self) -> usize {
        self.runner()
            .run_until_idle()
            .await
            .expect("Failed to drain job queue")
    }
}
