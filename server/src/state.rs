//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::StatusCache;
use crate::config::Config;
use crate::orchestrator::DevpodCli;
use crate::runtime::collector::MetricsCollector;
use crate::runtime::resolver::{ContainerResolver, MountContainerResolver};
use crate::runtime::DockerCli;
use crate::shell::{CommandRunner, ExecOptions, ProcessRunner};
use crate::subscriptions::SubscriptionRegistry;

/// Shared application state for the podwatch server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// Orchestrator status lookups, keyed by workspace id.
    pub status_cache: Arc<StatusCache>,
    pub devpod: DevpodCli,
    pub docker: DockerCli,
    /// Workspace → container mapping used by every container-scoped route.
    pub resolver: Arc<dyn ContainerResolver>,
    pub collector: MetricsCollector,
    /// One polling task per subscribed workspace, shared by all connections.
    pub subscriptions: SubscriptionRegistry,
}

impl AppState {
    /// Build state that spawns real `docker`/`devpod` processes.
    pub fn new(config: Config) -> Self {
        let runner = ProcessRunner::new(ExecOptions {
            timeout: config.runtime.command_timeout(),
        });
        Self::with_runner(config, Arc::new(runner))
    }

    /// Build state on top of an arbitrary [`CommandRunner`].
    pub fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        let docker = DockerCli::new(
            runner.clone(),
            &config.runtime.docker_bin,
            &config.runtime.container_label,
        );
        let devpod = DevpodCli::new(runner, &config.runtime.devpod_bin);
        let resolver: Arc<dyn ContainerResolver> =
            Arc::new(MountContainerResolver::new(docker.clone()));
        let collector = MetricsCollector::new(resolver.clone(), docker.clone());
        let subscriptions = SubscriptionRegistry::new(
            collector.clone(),
            config.metrics.poll_interval(),
            config.metrics.subscriber_queue_depth,
        );
        Self {
            status_cache: Arc::new(StatusCache::new(config.cache.status_ttl())),
            config: Arc::new(config),
            start_time: Instant::now(),
            devpod,
            docker,
            resolver,
            collector,
            subscriptions,
        }
    }
}
