//! Shared fixtures: a fake `docker`/`devpod` pair behind [`CommandRunner`].

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use podwatch::shell::{CommandRunner, ExecError, ExecOutput};
use podwatch::{AppState, Config};
use serde_json::json;

pub const WORKSPACE: &str = "csb-abc123";
pub const CONTAINER_ID: &str = "abc123def4567890fedcba";
pub const STATS_LINE: &str = "12.34%|100MiB / 2GiB|5.00%|1kB / 2kB|3MB / 4MB|42";

/// Answers `docker` and `devpod` invocations from canned output and records
/// every argv it sees.
#[derive(Default)]
pub struct FakeRuntime {
    container_up: AtomicBool,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeRuntime {
    pub fn new(container_up: bool) -> Arc<Self> {
        Arc::new(Self {
            container_up: AtomicBool::new(container_up),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_container_up(&self, up: bool) {
        self.container_up.store(up, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, argv: &[String]) -> Result<ExecOutput, ExecError> {
        let args: Vec<&str> = argv.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["docker", "ps", ..] => {
                if self.container_up.load(Ordering::SeqCst) {
                    ok(&format!("{CONTAINER_ID}|{WORKSPACE}-dev"))
                } else {
                    ok("")
                }
            }
            ["docker", "inspect", _, "--format", format] if format.contains("Mounts") => ok(
                "/home/dev/.devpod/agent/contexts/default/workspaces/csb-abc123/content",
            ),
            ["docker", "inspect", ..] => ok("8080/tcp:32768,5173/tcp:32769,"),
            ["docker", "stats", ..] => ok(STATS_LINE),
            ["docker", "logs", ..] => ok("2024-01-01T00:00:00Z ready\n2024-01-01T00:00:01Z listening"),
            ["devpod", "list", ..] => ok(&json!([
                {
                    "id": WORKSPACE,
                    "source": {"gitRepository": "https://github.com/acme/widgets.git", "gitBranch": "dev"}
                },
                {"id": "personal-box", "source": {}}
            ])
            .to_string()),
            ["devpod", "status", id] => ok(&format!("Workspace '{id}' is 'Running'")),
            ["devpod", "ssh", ..] => ok("Filesystem Size Used"),
            ["devpod", "up" | "stop" | "delete", ..] => ok("done"),
            _ => Err(ExecError::SpawnFailed {
                program: argv.first().cloned().unwrap_or_default(),
                reason: "unexpected invocation".into(),
            }),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRuntime {
    async fn run(&self, program: &str, args: &[&str]) -> Result<ExecOutput, ExecError> {
        let mut argv = vec![program.to_string()];
        argv.extend(args.iter().map(|a| (*a).to_string()));
        self.calls.lock().unwrap().push(argv.clone());
        self.answer(&argv)
    }
}

fn ok(stdout: &str) -> Result<ExecOutput, ExecError> {
    Ok(ExecOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

/// Test config: fast polling, default binaries.
pub fn config() -> Config {
    let mut config = Config::default();
    config.metrics.poll_interval_ms = 100;
    config
}

pub fn state(runtime: &Arc<FakeRuntime>) -> AppState {
    AppState::with_runner(config(), runtime.clone())
}
