//! Workspace endpoints.
//!
//! - `GET    /api/workspaces` — list sandboxes with cached status
//! - `GET    /api/workspaces/{name}/status` — live orchestrator status
//! - `POST   /api/workspaces/{name}/start` / `stop`, `DELETE /api/workspaces/{name}`
//! - `GET    /api/workspaces/{name}/ports` — published container ports
//! - `POST   /api/workspaces/{name}/execute` — allow-listed diagnostics over ssh
//! - `GET    /api/workspaces/{name}/logs?lines=N` — container log tail
//! - `GET    /api/workspaces/{name}/metrics` — one metrics snapshot

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::orchestrator;
use crate::runtime::stats::{now_ms, MetricsSnapshot};
use crate::shell::ExecError;
use crate::workspace::WorkspaceId;
use crate::AppState;

/// Default and maximum for `?lines=` on the logs endpoint.
const DEFAULT_LOG_LINES: u32 = 100;
const MAX_LOG_LINES: u32 = 10_000;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// `GET /api/workspaces`
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Value>> {
    let workspaces = state.devpod.list_sandboxes(&state.status_cache).await?;
    Ok(Json(workspaces))
}

/// `GET /api/workspaces/{name}/status` — bypasses the cache and refreshes it.
pub async fn status(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Value> {
    let id = WorkspaceId::parse(&name)?;
    let text = state
        .devpod
        .status_text(&id)
        .await
        .map_err(|e| ApiError::internal("Failed to get workspace status", e))?;
    let parsed = orchestrator::parse_status(&text);
    state.status_cache.put_default(id.as_str(), parsed.clone());
    Ok(Json(json!({ "status": text, "state": parsed })))
}

/// `POST /api/workspaces/{name}/start`
pub async fn start(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Value> {
    let id = WorkspaceId::parse(&name)?;
    state
        .devpod
        .up(&id)
        .await
        .map_err(|e| ApiError::internal("Failed to start workspace", e))?;
    state.status_cache.invalidate(id.as_str());
    info!(workspace = %id, "workspace started");
    Ok(Json(json!({ "message": "Workspace started successfully" })))
}

/// `POST /api/workspaces/{name}/stop`
pub async fn stop(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Value> {
    let id = WorkspaceId::parse(&name)?;
    state
        .devpod
        .stop(&id)
        .await
        .map_err(|e| ApiError::internal("Failed to stop workspace", e))?;
    state.status_cache.invalidate(id.as_str());
    info!(workspace = %id, "workspace stopped");
    Ok(Json(json!({ "message": "Workspace stopped successfully" })))
}

/// `DELETE /api/workspaces/{name}` — forced delete.
pub async fn delete(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Value> {
    let id = WorkspaceId::parse(&name)?;
    state
        .devpod
        .delete(&id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete workspace", e))?;
    state.status_cache.invalidate(id.as_str());
    info!(workspace = %id, "workspace deleted");
    Ok(Json(json!({ "message": "Workspace deleted successfully" })))
}

/// `GET /api/workspaces/{name}/ports` — `{"ports": []}` when no container.
pub async fn ports(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Value> {
    let id = WorkspaceId::parse(&name)?;
    let fail = |e: ExecError| ApiError::internal("Failed to get workspace ports", e);
    let Some(container) = state.resolver.resolve(&id).await.map_err(fail)? else {
        return Ok(Json(json!({ "ports": [] })));
    };
    let ports = state
        .docker
        .port_mappings(&container.id)
        .await
        .map_err(fail)?;
    Ok(Json(json!({ "ports": ports })))
}

/// Request body for `POST /api/workspaces/{name}/execute`.
#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub command: Option<String>,
}

/// `POST /api/workspaces/{name}/execute`
///
/// # Errors
///
/// - `400` — invalid workspace name, or `command` missing / not a string
/// - `403` — command not in [`orchestrator::ALLOWED_COMMANDS`]
pub async fn execute(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let id = WorkspaceId::parse(&name)?;
    let command = payload
        .ok()
        .and_then(|Json(body)| body.command)
        .filter(|c| !c.is_empty())
        .ok_or(ApiError::BadRequest("Invalid command"))?;
    if !orchestrator::is_allowed_command(&command) {
        return Err(ApiError::CommandNotAllowed);
    }

    let out = state
        .devpod
        .ssh(&id, &command)
        .await
        .map_err(|e| ApiError::internal("Failed to execute command", e))?;
    Ok(Json(json!({
        "output": out.text(),
        "command": command,
        "timestamp": now_ms(),
    })))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub lines: Option<u32>,
}

/// `GET /api/workspaces/{name}/logs?lines=N`
pub async fn logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let id = WorkspaceId::parse(&name)?;
    let Query(query) = query.map_err(|_| ApiError::BadRequest("Invalid lines parameter"))?;
    let lines = query
        .lines
        .unwrap_or(DEFAULT_LOG_LINES)
        .clamp(1, MAX_LOG_LINES);

    let fail = |e: ExecError| ApiError::internal("Failed to get workspace logs", e);
    let Some(container) = state.resolver.resolve(&id).await.map_err(fail)? else {
        return Ok(Json(json!({ "logs": "No container found" })));
    };
    let logs = state.docker.logs(&container.id, lines).await.map_err(fail)?;
    Ok(Json(json!({ "logs": logs, "containerId": container.display_id })))
}

/// `GET /api/workspaces/{name}/metrics`
pub async fn metrics(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<MetricsSnapshot> {
    let id = WorkspaceId::parse(&name)?;
    Ok(Json(state.collector.collect(&id).await?))
}
