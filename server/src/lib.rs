#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_async)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! podwatch library — the building blocks behind the `podwatch` binary.
//!
//! - `workspace` — workspace id grammar and the validated `WorkspaceId`
//! - `shell` — argv-based process execution behind the `CommandRunner` seam
//! - `runtime` — docker CLI adapter, container resolution, stats parsing
//! - `orchestrator` — devpod CLI adapter and command allow-list
//! - `cache` — TTL cache for orchestrator status
//! - `subscriptions` — per-workspace polling tasks shared by subscribers
//! - `routes` / `ws` — HTTP and WebSocket surfaces
//! - `middleware` — security headers and API rate limiting
//! - `config` — configuration loading

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod orchestrator;
pub mod routes;
pub mod runtime;
pub mod shell;
pub mod state;
pub mod subscriptions;
pub mod workspace;
pub mod ws;

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{delete, get, post},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

// Re-export key types at crate root for convenience.
pub use config::Config;
pub use state::AppState;

/// Build the full HTTP + WebSocket router.
///
/// API routes share one concurrency limit (`server.max_concurrent_requests`)
/// and a per-IP rate limit. When `server.static_dir` is set, unknown paths are
/// served from it, with `index.html` (status 200) for client-side routes.
/// Every response carries the [`middleware::SECURITY_HEADERS`].
pub fn router(state: AppState) -> Router {
    use crate::routes::{health, workspaces};

    let limit = state.config.server.max_concurrent_requests.max(1);
    let static_dir = state.config.server.static_dir.clone();

    let api_routes = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/workspaces", get(workspaces::list))
        .route("/api/workspaces/{name}", delete(workspaces::delete))
        .route("/api/workspaces/{name}/status", get(workspaces::status))
        .route("/api/workspaces/{name}/start", post(workspaces::start))
        .route("/api/workspaces/{name}/stop", post(workspaces::stop))
        .route("/api/workspaces/{name}/ports", get(workspaces::ports))
        .route("/api/workspaces/{name}/execute", post(workspaces::execute))
        .route("/api/workspaces/{name}/logs", get(workspaces::logs))
        .route("/api/workspaces/{name}/metrics", get(workspaces::metrics))
        .layer(ConcurrencyLimitLayer::new(limit));
    let api_routes = middleware::with_rate_limit(api_routes, &state.config.server);

    let ws_routes = Router::new()
        .route("/api/ws", get(ws::ws_upgrade))
        .route("/ws", get(ws::ws_upgrade));

    let mut app = Router::new()
        .merge(api_routes)
        .merge(ws_routes)
        .with_state(state);

    if let Some(dir) = static_dir {
        let dir = PathBuf::from(dir);
        app = app.fallback_service(ServeDir::new(&dir).fallback(index_fallback(dir)));
    }

    middleware::with_security_headers(app)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn index_fallback(dir: PathBuf) -> Router {
    Router::new().fallback(move || {
        let index_path = dir.join("index.html");
        async move {
            match tokio::fs::read_to_string(index_path).await {
                Ok(contents) => Html(contents).into_response(),
                Err(_) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            }
        }
    })
}
