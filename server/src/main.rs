#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # podwatch
//!
//! Metrics and control backend for container-backed development sandboxes.
//!
//! podwatch wraps the `devpod` orchestrator and the `docker` runtime CLIs
//! behind an HTTP API, and streams per-workspace resource snapshots to
//! WebSocket subscribers.
//!
//! ## Subcommands
//!
//! - `podwatch serve` (default) — run the HTTP/WS server
//!
//! ## API surface
//!
//! | Method | Path                                  | Description                        |
//! |--------|---------------------------------------|------------------------------------|
//! | GET    | `/api/health`                         | Liveness check                     |
//! | GET    | `/api/workspaces`                     | List sandboxes with status         |
//! | GET    | `/api/workspaces/{name}/status`       | Live orchestrator status           |
//! | POST   | `/api/workspaces/{name}/start`        | Start a workspace                  |
//! | POST   | `/api/workspaces/{name}/stop`         | Stop a workspace                   |
//! | DELETE | `/api/workspaces/{name}`              | Force-delete a workspace           |
//! | GET    | `/api/workspaces/{name}/ports`        | Published container ports          |
//! | POST   | `/api/workspaces/{name}/execute`      | Allow-listed diagnostic command    |
//! | GET    | `/api/workspaces/{name}/logs`         | Container log tail                 |
//! | GET    | `/api/workspaces/{name}/metrics`      | One metrics snapshot               |
//! | GET    | `/api/ws`, `/ws`                      | WebSocket metrics subscriptions    |
//!
//! ## Architecture
//!
//! ```text
//! main.rs            — entry point, clap subcommands, graceful shutdown
//! lib.rs             — router assembly
//! config.rs          — TOML + env-var configuration
//! workspace.rs       — workspace id grammar
//! cache.rs           — TTL status cache
//! orchestrator.rs    — devpod adapter, command allow-list
//! shell/             — CommandRunner seam, argv process execution
//! runtime/
//!   mod.rs           — docker adapter
//!   resolver.rs      — workspace → container mapping
//!   stats.rs         — snapshot types, stats line parser
//!   collector.rs     — one snapshot per call
//! subscriptions/     — shared polling tasks, per-connection forwarders
//! routes/            — HTTP handlers
//! ws/                — WebSocket upgrade and message dispatch
//! ```

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};

use podwatch::{AppState, Config};

/// Metrics and control backend for development sandboxes.
#[derive(Parser)]
#[command(name = "podwatch", version)]
struct Cli {
    /// Path to TOML config file (when no subcommand is given).
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/WS server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = match cli.command {
        Some(Commands::Serve { config }) => config.or(cli.config),
        None => cli.config,
    };
    run_server(config_path.as_deref()).await;
}

async fn run_server(config_path: Option<&str>) {
    let config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("podwatch: {e}");
            std::process::exit(1);
        }
    };

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("podwatch v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.server.listen);
    if let Some(dir) = &config.server.static_dir {
        info!("Serving frontend from {dir}");
    }

    let state = AppState::new(config);
    let app = podwatch::router(state.clone());

    let listener = match TcpListener::bind(&state.config.server.listen).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {e}", state.config.server.listen);
            std::process::exit(1);
        }
    };

    info!("Server ready");

    // Graceful shutdown
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM");
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT");
        }
    };

    // Peer addresses key the per-IP API rate limit.
    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, service)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("Server error: {e}");
    }

    info!("Shutting down...");
    state.subscriptions.shutdown().await;
    info!("Goodbye");
}
