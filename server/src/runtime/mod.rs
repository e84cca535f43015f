//! Container runtime (Docker CLI) access.
//!
//! - [`DockerCli`] — thin typed wrapper over the `docker` subcommands we consume
//! - [`resolver`] — workspace id → backing container
//! - [`stats`] — `docker stats` output parsing and the snapshot types
//! - [`collector`] — one-shot metrics collection for a workspace

pub mod collector;
pub mod resolver;
pub mod stats;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::shell::{CommandRunner, ExecError};

/// Number of id characters shown to users (matches `docker ps` short ids).
pub const DISPLAY_ID_LEN: usize = 12;

/// Format string handed to `docker stats`; [`stats::parse_stats_line`] expects
/// exactly these six fields.
pub const STATS_FORMAT: &str =
    "{{.CPUPerc}}|{{.MemUsage}}|{{.MemPerc}}|{{.NetIO}}|{{.BlockIO}}|{{.PIDs}}";

const PS_FORMAT: &str = "{{.ID}}|{{.Names}}";
const MOUNTS_FORMAT: &str = "{{range .Mounts}}{{.Source}}{{end}}";
const PORTS_FORMAT: &str =
    "{{range $port, $conf := .NetworkSettings.Ports}}{{$port}}:{{range $conf}}{{.HostPort}}{{end}},{{end}}";

/// A running container as reported by `docker ps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
}

/// The container currently backing a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub display_id: String,
}

impl ContainerHandle {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_id: id.chars().take(DISPLAY_ID_LEN).collect(),
        }
    }
}

/// A published container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: String,
}

/// Typed access to the `docker` CLI through a [`CommandRunner`].
#[derive(Clone)]
pub struct DockerCli {
    runner: Arc<dyn CommandRunner>,
    bin: String,
    /// Only containers carrying this label are considered workspace candidates.
    label: String,
}

impl DockerCli {
    pub fn new(runner: Arc<dyn CommandRunner>, bin: &str, label: &str) -> Self {
        Self {
            runner,
            bin: bin.to_string(),
            label: label.to_string(),
        }
    }

    /// `docker ps --filter label=<label> --format {{.ID}}|{{.Names}}`
    pub async fn list_running(&self) -> Result<Vec<ContainerSummary>, ExecError> {
        let filter = format!("label={}", self.label);
        let out = self
            .runner
            .run(&self.bin, &["ps", "--filter", &filter, "--format", PS_FORMAT])
            .await?;
        Ok(parse_ps_lines(&out.stdout))
    }

    /// Concatenated mount source paths of a container.
    pub async fn mount_sources(&self, container_id: &str) -> Result<String, ExecError> {
        let out = self
            .runner
            .run(&self.bin, &["inspect", container_id, "--format", MOUNTS_FORMAT])
            .await?;
        Ok(out.stdout)
    }

    /// Raw single-shot `docker stats` line for one container.
    pub async fn stats(&self, container_id: &str) -> Result<String, ExecError> {
        let out = self
            .runner
            .run(
                &self.bin,
                &["stats", "--no-stream", "--format", STATS_FORMAT, container_id],
            )
            .await?;
        Ok(out.stdout)
    }

    pub async fn port_mappings(&self, container_id: &str) -> Result<Vec<PortMapping>, ExecError> {
        let out = self
            .runner
            .run(&self.bin, &["inspect", container_id, "--format", PORTS_FORMAT])
            .await?;
        Ok(parse_port_map(&out.stdout))
    }

    /// Last `tail` log lines, timestamped.
    pub async fn logs(&self, container_id: &str, tail: u32) -> Result<String, ExecError> {
        let tail = tail.to_string();
        let out = self
            .runner
            .run(
                &self.bin,
                &["logs", "--tail", &tail, "--timestamps", container_id],
            )
            .await?;
        // docker logs replays the container's stderr on our stderr.
        if out.stderr.is_empty() {
            Ok(out.stdout)
        } else if out.stdout.is_empty() {
            Ok(out.stderr)
        } else {
            Ok(format!("{}\n{}", out.stdout, out.stderr))
        }
    }
}

/// Parse `id|name` lines, skipping blanks.
pub fn parse_ps_lines(output: &str) -> Vec<ContainerSummary> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(2, '|');
            let id = parts.next()?.trim();
            if id.is_empty() {
                return None;
            }
            Some(ContainerSummary {
                id: id.to_string(),
                name: parts.next().unwrap_or("").trim().to_string(),
            })
        })
        .collect()
}

/// Parse `8080/tcp:49153,5000/udp:49154,` into mappings.
///
/// Unpublished ports render with an empty host side (`22/tcp:,`) and are
/// skipped, as are pairs that do not parse as port numbers.
pub fn parse_port_map(output: &str) -> Vec<PortMapping> {
    output
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(|pair| {
            let (container, host) = pair.split_once(':')?;
            let (port, protocol) = match container.split_once('/') {
                Some((port, proto)) => (port, proto),
                None => (container, "tcp"),
            };
            Some(PortMapping {
                container_port: port.trim().parse().ok()?,
                host_port: host.trim().parse().ok()?,
                protocol: protocol.to_string(),
            })
        })
        .collect()
}
