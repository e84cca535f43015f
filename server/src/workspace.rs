//! Workspace identifier validation.
//!
//! This is the only input sanitization boundary: every handler that takes a
//! caller-supplied workspace name must turn it into a [`WorkspaceId`] before
//! the name can reach a command argument.

use std::fmt;

use serde::Serialize;

/// Accepted identifier prefixes (legacy and current sandbox naming).
const PREFIXES: [&str; 2] = ["claude-sandbox-", "csb-"];

/// Returns `true` if `id` matches `^(claude-sandbox-|csb-)[A-Za-z0-9_-]+$`.
pub fn is_valid(id: &str) -> bool {
    PREFIXES.iter().any(|prefix| {
        id.strip_prefix(prefix).is_some_and(|rest| {
            !rest.is_empty()
                && rest
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        })
    })
}

/// Returns `true` if an orchestrator-listed id looks like one of our sandboxes.
///
/// Looser than [`is_valid`]: the listing filter only checks for the naming
/// marker anywhere in the id.
pub fn is_sandbox_name(id: &str) -> bool {
    PREFIXES.iter().any(|prefix| id.contains(prefix))
}

/// The identifier failed [`is_valid`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid workspace name")]
pub struct ValidationError;

/// A validated workspace identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for WorkspaceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
