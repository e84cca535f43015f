//! Workspace → container resolution.
//!
//! Containers carry no explicit workspace label in this deployment. The
//! workspace id is embedded in the sandbox's backing directory, so
//! [`MountContainerResolver`] inspects the mount sources of every running
//! candidate and picks the first one whose mounts mention the id.
//!
//! The cost is one `docker inspect` per running container per call. That is
//! fine at a coarse polling cadence, not per UI interaction.

use async_trait::async_trait;
use tracing::debug;

use super::{ContainerHandle, DockerCli};
use crate::shell::ExecError;
use crate::workspace::WorkspaceId;

/// Maps a workspace to its backing container.
///
/// `Ok(None)` means no container currently backs the workspace, which is a
/// normal state, not an error.
#[async_trait]
pub trait ContainerResolver: Send + Sync {
    async fn resolve(&self, workspace: &WorkspaceId) -> Result<Option<ContainerHandle>, ExecError>;
}

/// Resolves by substring match of the workspace id against mount sources.
pub struct MountContainerResolver {
    docker: DockerCli,
}

impl MountContainerResolver {
    pub fn new(docker: DockerCli) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerResolver for MountContainerResolver {
    async fn resolve(&self, workspace: &WorkspaceId) -> Result<Option<ContainerHandle>, ExecError> {
        let candidates = self.docker.list_running().await?;
        for candidate in candidates {
            match self.docker.mount_sources(&candidate.id).await {
                Ok(mounts) if mounts.contains(workspace.as_str()) => {
                    debug!(
                        workspace = %workspace,
                        container = %candidate.id,
                        name = %candidate.name,
                        "resolved container"
                    );
                    return Ok(Some(ContainerHandle::new(&candidate.id)));
                }
                Ok(_) => {}
                // One candidate vanishing mid-scan must not hide a later match.
                Err(e) => debug!(container = %candidate.id, "inspect failed, skipping: {e}"),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::shell::fake::{fail, ok, ScriptedRunner};

    fn resolver(runner: &ScriptedRunner) -> MountContainerResolver {
        MountContainerResolver::new(DockerCli::new(
            Arc::new(runner.clone()),
            "docker",
            "dev.containers.id",
        ))
    }

    fn ws(id: &str) -> WorkspaceId {
        WorkspaceId::parse(id).unwrap()
    }

    fn three_containers(argv: &[String]) -> Result<crate::shell::ExecOutput, ExecError> {
        match (argv[1].as_str(), argv.get(2).map(String::as_str)) {
            ("ps", _) => ok("aaa111|one\nbbb222|two\nccc333|three"),
            ("inspect", Some("aaa111")) => ok("/home/u/.devpod/agent/contexts/default/workspaces/csb-other/content"),
            ("inspect", Some("bbb222")) => ok("/var/lib/docker/volumes/x/home/u/.devpod/workspaces/csb-target/content/tmp"),
            ("inspect", Some("ccc333")) => ok("/home/u/.devpod/workspaces/csb-target/content"),
            _ => fail("unexpected"),
        }
    }

    #[tokio::test]
    async fn test_resolves_first_matching_container() {
        let runner = ScriptedRunner::new(three_containers);
        let handle = resolver(&runner).resolve(&ws("csb-target")).await.unwrap();
        assert_eq!(handle, Some(ContainerHandle::new("bbb222")));
        // Stops scanning at the first hit.
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_no_match_is_none() {
        let runner = ScriptedRunner::new(three_containers);
        let handle = resolver(&runner).resolve(&ws("csb-missing")).await.unwrap();
        assert_eq!(handle, None);
    }

    #[tokio::test]
    async fn test_no_running_containers_is_none() {
        let runner = ScriptedRunner::new(|_| ok(""));
        let handle = resolver(&runner).resolve(&ws("csb-abc")).await.unwrap();
        assert_eq!(handle, None);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_inspect_failures_are_skipped() {
        let runner = ScriptedRunner::new(|argv: &[String]| {
            match (argv[1].as_str(), argv.get(2).map(String::as_str)) {
                ("ps", _) => ok("dead01|gone\ndead02|gone2\nlive03|ok"),
                ("inspect", Some("live03")) => ok("/workspaces/csb-abc/content"),
                _ => fail("Error: No such object"),
            }
        });
        let handle = resolver(&runner).resolve(&ws("csb-abc")).await.unwrap();
        assert_eq!(handle.map(|h| h.id), Some("live03".to_string()));
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let runner = ScriptedRunner::new(|_| fail("Cannot connect to the Docker daemon"));
        let err = resolver(&runner).resolve(&ws("csb-abc")).await.unwrap_err();
        assert!(matches!(err, ExecError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let runner = ScriptedRunner::new(three_containers);
        let r = resolver(&runner);
        let first = r.resolve(&ws("csb-other")).await.unwrap();
        let second = r.resolve(&ws("csb-other")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.map(|h| h.id), Some("aaa111".to_string()));
    }

    #[tokio::test]
    async fn test_ps_uses_label_filter() {
        let runner = ScriptedRunner::new(|_| ok(""));
        resolver(&runner).resolve(&ws("csb-abc")).await.unwrap();
        assert_eq!(
            runner.calls()[0],
            vec![
                "docker",
                "ps",
                "--filter",
                "label=dev.containers.id",
                "--format",
                "{{.ID}}|{{.Names}}"
            ]
        );
    }
}
