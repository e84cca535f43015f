//! Workspace orchestrator (DevPod CLI) access.
//!
//! Lifecycle operations (`up`, `stop`, `delete`) and the in-workspace command
//! runner are thin pass-throughs. The listing path enriches each sandbox with
//! its status, served from the [`StatusCache`] when fresh.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::warn;

use crate::cache::StatusCache;
use crate::shell::{CommandRunner, ExecError, ExecOutput};
use crate::workspace::{self, WorkspaceId};

/// State reported when the orchestrator's answer cannot be interpreted.
pub const UNKNOWN_STATE: &str = "Unknown";

/// Read-only diagnostics that may be run inside a workspace over ssh.
pub const ALLOWED_COMMANDS: &[&str] = &[
    "git status",
    "git branch",
    "docker system df",
    "df -h",
    "free -h",
    "ps aux --sort=-%cpu | head -10",
    "ls -la",
];

/// Returns `true` if `command` is on the [`ALLOWED_COMMANDS`] list (exact match).
pub fn is_allowed_command(command: &str) -> bool {
    ALLOWED_COMMANDS.contains(&command)
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("unexpected workspace listing: {0}")]
    InvalidListing(String),
}

/// Typed access to the `devpod` CLI through a [`CommandRunner`].
#[derive(Clone)]
pub struct DevpodCli {
    runner: Arc<dyn CommandRunner>,
    bin: String,
}

impl DevpodCli {
    pub fn new(runner: Arc<dyn CommandRunner>, bin: &str) -> Self {
        Self {
            runner,
            bin: bin.to_string(),
        }
    }

    /// `devpod list --output json`, as raw objects.
    pub async fn list(&self) -> Result<Vec<Map<String, Value>>, OrchestratorError> {
        let out = self
            .runner
            .run(&self.bin, &["list", "--output", "json"])
            .await?;
        if out.stdout.is_empty() {
            return Ok(Vec::new());
        }
        let entries: Vec<Value> = serde_json::from_str(&out.stdout)
            .map_err(|e| OrchestratorError::InvalidListing(e.to_string()))?;
        Ok(entries
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    /// Raw `devpod status` text.
    pub async fn status_text(&self, id: &WorkspaceId) -> Result<String, ExecError> {
        let out = self.runner.run(&self.bin, &["status", id.as_str()]).await?;
        Ok(out.text().to_string())
    }

    /// Parsed workspace state (`Running`, `Stopped`, ...).
    pub async fn state(&self, id: &WorkspaceId) -> Result<String, ExecError> {
        Ok(parse_status(&self.status_text(id).await?))
    }

    pub async fn up(&self, id: &WorkspaceId) -> Result<ExecOutput, ExecError> {
        self.runner.run(&self.bin, &["up", id.as_str()]).await
    }

    pub async fn stop(&self, id: &WorkspaceId) -> Result<ExecOutput, ExecError> {
        self.runner.run(&self.bin, &["stop", id.as_str()]).await
    }

    pub async fn delete(&self, id: &WorkspaceId) -> Result<ExecOutput, ExecError> {
        self.runner
            .run(&self.bin, &["delete", id.as_str(), "--force"])
            .await
    }

    /// Run `command` through `bash -c` inside the workspace.
    ///
    /// Callers must check [`is_allowed_command`] first; the command string is
    /// interpreted by the workspace's shell.
    pub async fn ssh(&self, id: &WorkspaceId, command: &str) -> Result<ExecOutput, ExecError> {
        self.runner
            .run(&self.bin, &["ssh", id.as_str(), "--", "bash", "-c", command])
            .await
    }

    /// List sandbox workspaces, each enriched with `status` and `source`.
    ///
    /// Status lookups run concurrently and are cached. A failed lookup marks
    /// that workspace `Unknown` instead of failing the whole listing.
    pub async fn list_sandboxes(
        &self,
        cache: &StatusCache,
    ) -> Result<Vec<Value>, OrchestratorError> {
        let sandboxes = self.list().await?.into_iter().filter(|w| {
            w.get("id")
                .and_then(Value::as_str)
                .is_some_and(workspace::is_sandbox_name)
        });
        Ok(join_all(sandboxes.map(|w| self.enrich(w, cache))).await)
    }

    async fn enrich(&self, mut entry: Map<String, Value>, cache: &StatusCache) -> Value {
        let id = entry
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = match self.cached_state(&id, cache).await {
            Ok(state) => state,
            Err(e) => {
                warn!(workspace = %id, "status lookup failed: {e}");
                entry.insert("status".into(), Value::from(UNKNOWN_STATE));
                entry.insert("source".into(), Value::from(UNKNOWN_STATE));
                return Value::Object(entry);
            }
        };
        let source = entry
            .get("source")
            .map_or_else(|| UNKNOWN_STATE.to_string(), describe_source);
        entry.insert("status".into(), Value::from(status));
        entry.insert("source".into(), Value::from(source));
        Value::Object(entry)
    }

    async fn cached_state(&self, id: &str, cache: &StatusCache) -> Result<String, ExecError> {
        if let Some(state) = cache.get(id) {
            return Ok(state);
        }
        // Listed ids come from the orchestrator, but still must pass the
        // grammar before they become a command argument.
        let Ok(ws) = WorkspaceId::parse(id) else {
            return Ok(UNKNOWN_STATE.to_string());
        };
        let state = self.state(&ws).await?;
        cache.put_default(id, state.clone());
        Ok(state)
    }
}

/// Extract the state from `Workspace '<id>' is '<State>'`.
///
/// Returns [`UNKNOWN_STATE`] when no line has that shape.
pub fn parse_status(output: &str) -> String {
    output
        .lines()
        .find_map(parse_status_line)
        .unwrap_or_else(|| UNKNOWN_STATE.to_string())
}

fn parse_status_line(line: &str) -> Option<String> {
    line.match_indices("Workspace")
        .find_map(|(at, word)| parse_status_from(&line[at + word.len()..]))
}

fn parse_status_from(rest: &str) -> Option<String> {
    let rest = skip_whitespace(rest)?.strip_prefix('\'')?;
    let (name, rest) = rest.split_once('\'')?;
    if name.is_empty() {
        return None;
    }
    let rest = skip_whitespace(rest)?.strip_prefix("is")?;
    let rest = skip_whitespace(rest)?.strip_prefix('\'')?;
    let (state, _) = rest.split_once('\'')?;
    (!state.is_empty()).then(|| state.to_string())
}

/// Strip a run of at least one whitespace character.
fn skip_whitespace(s: &str) -> Option<&str> {
    let trimmed = s.trim_start();
    (trimmed.len() < s.len()).then_some(trimmed)
}

/// Render a listing `source` as `owner/repo@branch`.
fn describe_source(source: &Value) -> String {
    let Some(repo) = source.get("gitRepository").and_then(Value::as_str) else {
        return UNKNOWN_STATE.to_string();
    };
    let name = repo
        .split_once("github.com/")
        .and_then(|(_, path)| path.strip_suffix(".git"))
        .filter(|path| !path.is_empty())
        .unwrap_or(UNKNOWN_STATE);
    let branch = source
        .get("gitBranch")
        .and_then(Value::as_str)
        .unwrap_or("main");
    format!("{name}@{branch}")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::shell::fake::{fail, ok, ScriptedRunner};

    fn devpod(runner: &ScriptedRunner) -> DevpodCli {
        DevpodCli::new(Arc::new(runner.clone()), "devpod")
    }

    #[test]
    fn test_parse_status_states() {
        for state in ["Running", "Started", "Stopped", "NotFound", "Starting", "Stopping"] {
            let text = format!("Workspace 'csb-a' is '{state}'");
            assert_eq!(parse_status(&text), state);
        }
    }

    #[test]
    fn test_parse_status_with_log_prefix() {
        let text = "12:00:01 info Workspace 'csb-a' is 'Running'\n";
        assert_eq!(parse_status(text), "Running");
    }

    #[test]
    fn test_parse_status_garbage_is_unknown() {
        assert_eq!(parse_status(""), "Unknown");
        assert_eq!(parse_status("fatal: workspace not found"), "Unknown");
        assert_eq!(parse_status("Workspace '' is 'Running'"), "Unknown");
    }

    #[test]
    fn test_parse_status_requires_separating_whitespace() {
        assert_eq!(parse_status("Workspace'csb-a' is 'Running'"), "Unknown");
        assert_eq!(parse_status("Workspace 'csb-a'is 'Running'"), "Unknown");
        assert_eq!(parse_status("Workspace 'csb-a' is'Running'"), "Unknown");
        assert_eq!(parse_status("Workspace'x'is'Running'"), "Unknown");
        assert_eq!(parse_status("Workspace\t'csb-a'  is\t'Stopped'"), "Stopped");
        assert_eq!(
            parse_status("Workspaces: Workspace 'csb-a' is 'Running'"),
            "Running"
        );
    }

    #[test]
    fn test_describe_source() {
        assert_eq!(
            describe_source(&json!({
                "gitRepository": "https://github.com/acme/widgets.git",
                "gitBranch": "dev"
            })),
            "acme/widgets@dev"
        );
        assert_eq!(
            describe_source(&json!({"gitRepository": "https://github.com/acme/widgets.git"})),
            "acme/widgets@main"
        );
        assert_eq!(
            describe_source(&json!({"gitRepository": "https://gitlab.com/a/b"})),
            "Unknown@main"
        );
        assert_eq!(describe_source(&json!({"localFolder": "/src"})), "Unknown");
    }

    #[test]
    fn test_allowed_commands() {
        assert!(is_allowed_command("git status"));
        assert!(!is_allowed_command("git status; rm -rf /"));
        assert!(!is_allowed_command("rm -rf /"));
    }

    #[tokio::test]
    async fn test_lifecycle_argv() {
        let runner = ScriptedRunner::new(|_| ok(""));
        let cli = devpod(&runner);
        let id = WorkspaceId::parse("csb-abc").unwrap();
        cli.up(&id).await.unwrap();
        cli.stop(&id).await.unwrap();
        cli.delete(&id).await.unwrap();
        cli.ssh(&id, "df -h").await.unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                vec!["devpod", "up", "csb-abc"],
                vec!["devpod", "stop", "csb-abc"],
                vec!["devpod", "delete", "csb-abc", "--force"],
                vec!["devpod", "ssh", "csb-abc", "--", "bash", "-c", "df -h"],
            ]
        );
    }

    #[tokio::test]
    async fn test_list_sandboxes_filters_enriches_and_caches() {
        let runner = ScriptedRunner::new(|argv: &[String]| match argv[1].as_str() {
            "list" => ok(&json!([
                {"id": "csb-one", "source": {"gitRepository": "https://github.com/a/b.git"}},
                {"id": "claude-sandbox-two"},
                {"id": "unrelated"},
                {"id": "csb-broken"},
            ])
            .to_string()),
            "status" if argv[2] == "csb-broken" => fail("boom"),
            "status" => Ok(ExecOutput {
                stdout: String::new(),
                stderr: format!("Workspace '{}' is 'Running'", argv[2]),
            }),
            _ => fail("unexpected"),
        });
        let cli = devpod(&runner);
        let cache = StatusCache::new(Duration::from_secs(30));

        let list = cli.list_sandboxes(&cache).await.unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0]["status"], "Running");
        assert_eq!(list[0]["source"], "a/b@main");
        assert_eq!(list[1]["id"], "claude-sandbox-two");
        assert_eq!(list[1]["source"], "Unknown");
        assert_eq!(list[2]["status"], "Unknown");
        assert_eq!(cache.get("csb-one").as_deref(), Some("Running"));
        assert_eq!(cache.get("csb-broken"), None);

        let status_calls = |r: &ScriptedRunner| r.calls().iter().filter(|c| c[1] == "status").count();
        assert_eq!(status_calls(&runner), 3);
        cli.list_sandboxes(&cache).await.unwrap();
        // csb-one and claude-sandbox-two are served from the cache.
        assert_eq!(status_calls(&runner), 4);
    }

    #[tokio::test]
    async fn test_list_invalid_json() {
        let runner = ScriptedRunner::new(|_| ok("not json"));
        let cache = StatusCache::new(Duration::from_secs(30));
        let err = devpod(&runner).list_sandboxes(&cache).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidListing(_)));
    }
}
