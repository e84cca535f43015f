//! Health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// `GET /api/health` — liveness check.
///
/// Returns status, uptime, version and the number of workspaces currently
/// being polled. Never touches the container runtime.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    let active_streams = state.subscriptions.active_polls().await;
    Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "active_streams": active_streams,
        "cached_statuses": state.status_cache.len(),
    }))
}
