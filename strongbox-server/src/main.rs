//! strongbox server binary.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use strongbox_server::config::TOKEN_SECRET_ENV;
use strongbox_server::{build_router, cleanup, AppState, RemoteStore, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strongbox-server", about = "strongbox remote store server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "strongbox-server.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Database path override
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.storage_path = database;
    }
    if let Ok(secret) = std::env::var(TOKEN_SECRET_ENV) {
        cfg.token_secret = secret;
    }
    cfg.validate()?;

    tracing::info!("Starting strongbox server on {}", cfg.listen_addr);

    let storage = RemoteStore::open(&cfg.storage_path)?;
    let state = AppState::new(storage.clone(), &cfg)?;
    let pruner = cleanup::spawn_cleanup_task(
        storage,
        Duration::from_secs(cfg.cleanup_interval_secs.max(1)),
    );
    let app = build_router(state, &cfg);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruner.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
