//! # moot-agent
//!
//! moot server binary — wires together the session store, the branch
//! state store, the orchestrator, and the control-plane server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use moot_rpc::handlers::register_all;
use moot_rpc::{MethodRegistry, RpcContext};
use moot_runtime::Orchestrator;
use moot_server::{MootServer, ServerConfig};
use moot_sessions::{SessionStore, SessionStoreConfig};
use moot_settings::MootSettings;
use moot_state::BrainstormStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// The question-renderer bundle served to browsers at `GET /`.
const UI_HTML: &str = include_str!("../assets/questions.html");

/// moot brainstorm coordination server.
#[derive(Parser, Debug)]
#[command(name = "moot-agent", about = "moot brainstorm coordination server")]
struct Cli {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Control-plane port (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Directory for persisted brainstorm state.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Skip launching the platform browser (testing only).
    #[arg(long)]
    skip_browser: bool,

    /// Path to the settings file (defaults to `~/.moot/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

/// Resolve settings from file, env, and CLI (CLI wins).
fn resolve_settings(cli: &Cli) -> Result<MootSettings> {
    let mut settings = match &cli.settings {
        Some(path) => moot_settings::load_settings_from_path(path),
        None => moot_settings::load_settings(),
    }
    .context("failed to load settings")?;

    if let Some(host) = &cli.host {
        settings.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(state_dir) = &cli.state_dir {
        settings.server.state_dir = state_dir.to_string_lossy().into_owned();
    }
    if cli.skip_browser {
        settings.server.skip_browser = true;
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_env("MOOT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let sessions = SessionStore::new(SessionStoreConfig {
        host: settings.server.host.clone(),
        port: settings.server.session_port,
        skip_browser: settings.server.skip_browser,
        ui_html: Arc::from(UI_HTML),
    });
    let state = Arc::new(
        BrainstormStore::new(&settings.server.state_dir)
            .context("failed to open the state directory")?,
    );
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&sessions), Arc::clone(&state)));

    let mut registry = MethodRegistry::new();
    register_all(&mut registry);

    let rpc_context = RpcContext::new(
        orchestrator,
        Arc::clone(&sessions),
        state,
        settings.clone(),
    );
    let server = MootServer::new(
        ServerConfig::from_settings(&settings.server),
        registry,
        rpc_context,
        metrics_handle,
    );

    let (addr, server_handle) = server
        .listen()
        .await
        .context("failed to bind the control-plane server")?;
    info!(%addr, state_dir = %settings.server.state_dir, "moot ready");

    server.shutdown().register("control-server", server_handle);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    sessions.end_all_sessions().await;
    server
        .shutdown()
        .drain(moot_server::ShutdownCoordinator::DRAIN_GRACE)
        .await;
    Ok(())
}
