//! Low-level process spawning and output capture.
//!
//! Every external program (`docker`, `devpod`) goes through [`exec_program`].
//! Arguments are handed to the OS as a discrete argv list; nothing is ever
//! joined into a shell string, so identifier content cannot inject commands.

use std::fmt::Write;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Max output size per stream (1 MB).
///
/// Output beyond this limit is still drained from the pipe (to prevent
/// deadlocks) but discarded. A truncation notice is appended to the returned
/// string.
const MAX_EXEC_OUTPUT: usize = 1024 * 1024;

/// Per-call options for [`exec_program`].
#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    /// Kill the process and fail with [`ExecError::Timeout`] after this long.
    pub timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Captured output of a program that exited with status 0.
///
/// Both streams are trimmed of leading/trailing whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Stdout if non-empty, otherwise stderr.
    ///
    /// Some CLIs (devpod among them) print their human-readable answer on
    /// stderr.
    pub fn text(&self) -> &str {
        if self.stdout.is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Errors that can occur during [`exec_program`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// The program could not be started (e.g. not found, permission denied).
    #[error("failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },
    /// The program ran and exited non-zero (or was killed by a signal, in
    /// which case `exit_code` is `-1`).
    #[error("command failed with code {exit_code}: {stderr}")]
    Failed { exit_code: i32, stderr: String },
    /// The program exceeded its timeout and was killed.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
}

/// Run `program` with `args` and capture its output.
///
/// Stdout and stderr are read concurrently (to avoid pipe deadlock) and each
/// capped at [`MAX_EXEC_OUTPUT`] bytes. The process has `kill_on_drop(true)`,
/// so cancelling the returned future (or hitting the timeout) kills it.
pub async fn exec_program(
    program: &str,
    args: &[&str],
    options: ExecOptions,
) -> Result<ExecOutput, ExecError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ExecError::SpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

    let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(ExecError::SpawnFailed {
            program: program.to_string(),
            reason: "stdio pipes unavailable".to_string(),
        });
    };

    let run = async {
        let (stdout_data, stderr_data) = tokio::join!(
            read_capped(&mut stdout, MAX_EXEC_OUTPUT),
            read_capped(&mut stderr, MAX_EXEC_OUTPUT),
        );
        drop(stdout);
        drop(stderr);

        let status = child.wait().await.map_err(|e| ExecError::SpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

        let stdout = stdout_data.trim().to_string();
        let stderr = stderr_data.trim().to_string();
        if status.success() {
            Ok(ExecOutput { stdout, stderr })
        } else {
            // Some tools report failures on stdout only.
            let detail = if stderr.is_empty() { stdout } else { stderr };
            Err(ExecError::Failed {
                exit_code: status.code().unwrap_or(-1),
                stderr: detail,
            })
        }
    };

    match Box::pin(tokio::time::timeout(options.timeout, run)).await {
        Ok(result) => result,
        Err(_) => Err(ExecError::Timeout(options.timeout)),
    }
}

/// Read from an async reader, keeping the first `max_bytes` and discarding the
/// rest.
///
/// Keeps reading past the cap instead of closing the pipe early: closing a
/// pipe while the child is still writing causes SIGPIPE in the child.
async fn read_capped(reader: &mut (impl tokio::io::AsyncRead + Unpin), max_bytes: usize) -> String {
    let mut buf = Vec::with_capacity(max_bytes.min(65536));
    let mut tmp = [0u8; 8192];
    let mut total_read = 0usize;
    loop {
        match reader.read(&mut tmp).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                total_read += n;
                if buf.len() < max_bytes {
                    let take = n.min(max_bytes - buf.len());
                    buf.extend_from_slice(&tmp[..take]);
                }
            }
        }
    }
    let mut s = String::from_utf8_lossy(&buf).into_owned();
    if total_read > max_bytes {
        let _ = write!(
            s,
            "\n[truncated: {total_read} bytes total, showing first {max_bytes}]"
        );
    }
    s
}
