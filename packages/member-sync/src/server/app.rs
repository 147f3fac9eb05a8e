//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    bulk_remove_handler, change_status_handler, health_handler, submit_status_handler,
    upload_onboarding_session_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
}

/// Build the Axum application router.
///
/// Handlers only submit jobs; the job runner is started separately.
pub fn build_app(deps: Arc<ServerDeps>) -> Router {
    let state = AppState { deps };

    Router::new()
        .route("/health", get(health_handler))
        .route("/members/status", post(submit_status_handler))
        .route("/members/bulk-remove", post(bulk_remove_handler))
        .route("/members/:id/status", post(change_status_handler))
        .route("/onboarding-sessions", post(upload_onboarding_session_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
