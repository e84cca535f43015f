//! HTTP error mapping.
//!
//! Every handler returns `Result<_, ApiError>`. The body is always
//! `{"error": "<message>"}`; internal details are logged, not returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::orchestrator::OrchestratorError;
use crate::runtime::collector::CollectError;
use crate::shell::ExecError;
use crate::workspace::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The workspace name failed validation (400).
    #[error(transparent)]
    InvalidWorkspace(#[from] ValidationError),
    /// The request body is unusable (400).
    #[error("{0}")]
    BadRequest(&'static str),
    /// The requested command is not allow-listed (403).
    #[error("Command not allowed")]
    CommandNotAllowed,
    /// An external command or its output failed (500). The first field is the
    /// public message.
    #[error("{0}")]
    Internal(&'static str, String),
}

impl ApiError {
    /// Wrap a backend failure under a public `message`, keeping the detail for
    /// the log.
    pub fn internal(message: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::Internal(message, detail.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidWorkspace(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::CommandNotAllowed => StatusCode::FORBIDDEN,
            Self::Internal(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Context-free conversions for `?` in handlers; callers that can say more
/// use [`ApiError::internal`].
impl From<ExecError> for ApiError {
    fn from(e: ExecError) -> Self {
        Self::internal("Command execution failed", e)
    }
}

impl From<CollectError> for ApiError {
    fn from(e: CollectError) -> Self {
        Self::internal("Failed to get workspace metrics", e)
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        Self::internal("Failed to fetch workspaces", e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(message, detail) = &self {
            error!("{message}: {detail}");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
