//! `relay` server binary — startup wiring and graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use relay_server::state::{AppState, table_config};
use relay_server::{metrics, router, spawn_eviction_sweeper};
use relay_session::SessionTable;
use relay_upstream::{OpenRouterConfig, OpenRouterProvider};
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Chat relay server.
#[derive(Debug, Parser)]
#[command(name = "relay", version, about)]
struct Args {
    /// WebSocket listen port (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// SQLite history database path (overrides settings).
    #[arg(long)]
    db: Option<String>,

    /// Settings file path (defaults to ~/.relay/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    relay_core::logging::init();
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => relay_settings::load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => relay_settings::load_settings().context("loading settings")?,
    };
    if let Some(port) = args.port {
        settings.server.ws_port = port;
    }
    if let Some(db) = args.db {
        settings.server.db_path = db;
    }

    let metrics_handle = metrics::install_recorder();

    let pool = relay_history::new_file(
        &settings.server.db_path,
        &relay_history::ConnectionConfig::default(),
    )
    .with_context(|| format!("opening history database {}", settings.server.db_path))?;
    relay_history::run_migrations(&*pool.get()?).context("running migrations")?;
    let store = Arc::new(relay_history::SqliteHistory::new(pool));

    let provider = Arc::new(OpenRouterProvider::new(OpenRouterConfig {
        base_url: Some(settings.upstream.base_url.clone()),
        api_key: settings.upstream.api_key.clone(),
    }));

    let config = table_config(&settings);
    let table = Arc::new(SessionTable::new(config, provider, store));

    // Sweep at half the idle window so eviction lag stays bounded.
    let sweep_interval =
        Duration::from_secs((settings.sessions.idle_eviction_secs / 2).max(1));
    let sweeper = spawn_eviction_sweeper(Arc::clone(&table), sweep_interval);

    let state = AppState {
        table: Arc::clone(&table),
        metrics: metrics_handle,
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.ws_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, db = %settings.server.db_path, "relay server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.abort();
    table.shutdown_all().await;
    info!("relay server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
