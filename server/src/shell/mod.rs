//! External program execution.
//!
//! [`process::exec_program`] does the actual spawning. Higher layers (the
//! container resolver, metrics collector and orchestrator client) never call it
//! directly; they hold an `Arc<dyn CommandRunner>` so tests can substitute a
//! scripted runner and assert exactly which programs would have been spawned.

pub mod process;

use async_trait::async_trait;

pub use process::{ExecError, ExecOptions, ExecOutput};

/// Runs an external program with a discrete argument list.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<ExecOutput, ExecError>;
}

/// Production [`CommandRunner`] that spawns real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    options: ExecOptions,
}

impl ProcessRunner {
    pub fn new(options: ExecOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<ExecOutput, ExecError> {
        tracing::trace!(program, ?args, "exec");
        process::exec_program(program, args, self.options).await
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::{CommandRunner, ExecError, ExecOutput};

    type Handler = dyn Fn(&[String]) -> Result<ExecOutput, ExecError> + Send + Sync;

    /// Test runner that answers from a closure and records every invocation.
    ///
    /// The closure receives `[program, args...]`.
    #[derive(Clone)]
    pub struct ScriptedRunner {
        handler: Arc<Handler>,
        calls: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl ScriptedRunner {
        pub fn new(
            handler: impl Fn(&[String]) -> Result<ExecOutput, ExecError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Arc::new(handler),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[&str]) -> Result<ExecOutput, ExecError> {
            let mut argv = vec![program.to_string()];
            argv.extend(args.iter().map(ToString::to_string));
            self.calls.lock().unwrap().push(argv.clone());
            (self.handler)(&argv)
        }
    }

    /// Runner backing one container for `csb-abc123` whose `docker stats`
    /// call blocks until [`GatedRunner::release`].
    #[derive(Clone, Default)]
    pub struct GatedRunner {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl GatedRunner {
        /// Resolves once a `stats` call is in flight.
        pub async fn wait_started(&self) {
            self.started.notified().await;
        }

        pub fn release(&self) {
            self.release.notify_one();
        }
    }

    #[async_trait]
    impl CommandRunner for GatedRunner {
        async fn run(&self, _program: &str, args: &[&str]) -> Result<ExecOutput, ExecError> {
            match args.first().copied() {
                Some("ps") => ok("0123456789abcdef|devpod"),
                Some("inspect") => ok("/workspaces/csb-abc123/content"),
                _ => {
                    self.started.notify_one();
                    self.release.notified().await;
                    ok("1%|1MiB / 1GiB|0.1%|0B / 0B|0B / 0B|3")
                }
            }
        }
    }

    pub fn ok(stdout: &str) -> Result<ExecOutput, ExecError> {
        Ok(ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    pub fn fail(stderr: &str) -> Result<ExecOutput, ExecError> {
        Err(ExecError::Failed {
            exit_code: 1,
            stderr: stderr.to_string(),
        })
    }
}
