// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Huddle signaling server entry point.
use anyhow::Context;
use clap::Parser;
use huddle_backend_lib::{
    config::{Settings, DEFAULT_CONFIG_FILE},
    logging, ws_router, AppState,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "huddle-server", version, about = "Signaling server for peer-to-peer calls")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the bind address from the configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }

    logging::init_tracing(&settings).context("installing tracing subscriber")?;

    let addr = settings.bind_addr;
    let state = Arc::new(AppState::new(settings));
    let app = ws_router::create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
