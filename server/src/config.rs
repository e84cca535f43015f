//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `PODWATCH_LISTEN`, `PORT`,
//!    `PODWATCH_DOCKER_BIN`, `PODWATCH_DEVPOD_BIN`
//! 2. **Config file** — path via `--config <path>`, or `podwatch.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:3001"
//! static_dir = "dashboard/frontend/build"  # optional
//! max_concurrent_requests = 64
//! rate_limit_requests = 100     # per client IP per window on /api; 0 = off
//! rate_limit_window_secs = 900
//!
//! [runtime]
//! docker_bin = "docker"
//! devpod_bin = "devpod"
//! container_label = "dev.containers.id"
//! command_timeout_ms = 30000
//!
//! [cache]
//! status_ttl_secs = 30
//!
//! [metrics]
//! poll_interval_ms = 3000
//! subscriber_queue_depth = 16
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "podwatch.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:3001`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Built frontend to serve for non-API paths. Unset = API only.
    #[serde(default)]
    pub static_dir: Option<String>,
    /// Cap on in-flight HTTP requests (default 64).
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Requests each client IP may make to `/api` per window (default 100).
    /// `0` disables rate limiting.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,
    /// Rate-limit window in seconds (default 900).
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

/// External CLI locations and limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Container runtime binary (default `docker`).
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    /// Workspace orchestrator binary (default `devpod`).
    #[serde(default = "default_devpod_bin")]
    pub devpod_bin: String,
    /// Only containers with this label are workspace candidates.
    #[serde(default = "default_container_label")]
    pub container_label: String,
    /// Per-command timeout in milliseconds (default 30 000).
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

/// Orchestrator status cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached workspace status stays fresh (default 30).
    #[serde(default = "default_status_ttl_secs")]
    pub status_ttl_secs: u64,
}

/// Metrics streaming.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Milliseconds between readings for a subscribed workspace (default 3000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Snapshots buffered per subscriber before the oldest are dropped (default 16).
    #[serde(default = "default_subscriber_queue_depth")]
    pub subscriber_queue_depth: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:3001".to_string()
}
fn default_max_concurrent_requests() -> usize {
    64
}
fn default_rate_limit_requests() -> u32 {
    100
}
fn default_rate_limit_window_secs() -> u64 {
    900
}
fn default_docker_bin() -> String {
    "docker".to_string()
}
fn default_devpod_bin() -> String {
    "devpod".to_string()
}
fn default_container_label() -> String {
    "dev.containers.id".to_string()
}
fn default_command_timeout_ms() -> u64 {
    30000
}
fn default_status_ttl_secs() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    3000
}
fn default_subscriber_queue_depth() -> usize {
    16
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            static_dir: None,
            max_concurrent_requests: default_max_concurrent_requests(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_bin: default_docker_bin(),
            devpod_bin: default_devpod_bin(),
            container_label: default_container_label(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            status_ttl_secs: default_status_ttl_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            subscriber_queue_depth: default_subscriber_queue_depth(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RuntimeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl CacheConfig {
    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }
}

impl MetricsConfig {
    /// Poll period, never shorter than 100 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }
}

/// Reading or parsing the config file failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file must exist. Otherwise `podwatch.toml` in
    /// the current directory is used when present.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Env var overrides. `PODWATCH_LISTEN` wins over `PORT`.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("PORT") {
            self.server.listen = format!("0.0.0.0:{port}");
        }
        if let Some(listen) = var("PODWATCH_LISTEN") {
            self.server.listen = listen;
        }
        if let Some(bin) = var("PODWATCH_DOCKER_BIN") {
            self.runtime.docker_bin = bin;
        }
        if let Some(bin) = var("PODWATCH_DEVPOD_BIN") {
            self.runtime.devpod_bin = bin;
        }
    }
}
