//! One-shot metrics collection for a workspace.

use std::sync::Arc;

use super::resolver::ContainerResolver;
use super::stats::{now_ms, parse_stats_line, MetricsSnapshot, StatsParseError};
use super::DockerCli;
use crate::shell::ExecError;
use crate::workspace::WorkspaceId;

/// Collection failed for a reason other than "no container".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Parse(#[from] StatsParseError),
}

/// Resolves a workspace's container and reads a single stats snapshot.
#[derive(Clone)]
pub struct MetricsCollector {
    resolver: Arc<dyn ContainerResolver>,
    docker: DockerCli,
}

impl MetricsCollector {
    pub fn new(resolver: Arc<dyn ContainerResolver>, docker: DockerCli) -> Self {
        Self { resolver, docker }
    }

    /// Take one reading.
    ///
    /// A workspace without a container yields a `no_container` snapshot. Any
    /// command failure after resolution, or malformed stats output, is an
    /// error.
    pub async fn collect(&self, workspace: &WorkspaceId) -> Result<MetricsSnapshot, CollectError> {
        let Some(container) = self.resolver.resolve(workspace).await? else {
            return Ok(MetricsSnapshot::no_container());
        };
        let line = self.docker.stats(&container.id).await?;
        let metrics = parse_stats_line(&line, &container.display_id, now_ms())?;
        Ok(MetricsSnapshot::running(metrics))
    }
}
