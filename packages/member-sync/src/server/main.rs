// Main entry point for the member sync server

use std::sync::Arc;

use anyhow::{Context, Result};
use member_sync::domains::build_job_registry;
use member_sync::kernel::jobs::{JobQueue, JobRunner, JobRunnerConfig, PostgresJobQueue};
use member_sync::kernel::ServerDeps;
use member_sync::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,member_sync=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting member sync server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let job_queue: Arc<dyn JobQueue> =
        Arc::new(PostgresJobQueue::new(pool.clone()).with_max_retries(config.job_max_retries));
    let deps = Arc::new(ServerDeps::from_config(&config, pool, job_queue.clone()));

    // Spawn the job runner with every handler registered
    let runner = JobRunner::with_config(
        job_queue,
        build_job_registry(),
        deps.clone(),
        JobRunnerConfig::from_config(&config),
    );
    let runner_handle = tokio::spawn(async move {
        if let Err(e) = runner.run_until_shutdown().await {
            tracing::error!(error = %e, "Job runner exited with error");
        }
    });

    let app = build_app(deps);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    // Let the runner finish its in-flight batch
    runner_handle.await.context("Job runner task panicked")?;

    Ok(())
}
