use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

/// GET /health: liveness check, returns server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let pending = match state.store.count() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("health: job count failed: {e}");
            None
        }
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "title": state.config.station.title,
        "timezone": state.tz.name(),
        "pending_jobs": pending,
    }))
}
