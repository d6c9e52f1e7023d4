use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono_tz::Tz;
use prerec_core::config::PrerecConfig;
use prerec_scheduler::JobStore;
use std::sync::Arc;

use crate::http::{health, jobs, ui};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: PrerecConfig,
    /// `config.schedule.timezone`, resolved once at startup.
    pub tz: Tz,
    pub store: JobStore,
}

impl AppState {
    pub fn new(config: PrerecConfig, tz: Tz, store: JobStore) -> Self {
        Self { config, tz, store }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ui::ui_handler))
        .route("/health", get(health::health_handler))
        .route("/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route("/jobs/{id}", delete(jobs::delete_job))
        // Routes kept for clients of the earlier service.
        .route("/add", post(jobs::create_job))
        .route("/list", get(jobs::list_jobs))
        .route("/delete/{id}", get(jobs::delete_job).delete(jobs::delete_job))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
