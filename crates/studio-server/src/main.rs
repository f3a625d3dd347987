use std::net::SocketAddr;

use anyhow::Context as _;
use clap::Parser;
use tracing::info;

use studio_server::{AppState, ServerConfig, config, observability, router};

#[derive(Debug, Parser)]
#[command(name = "studio-server", version, about = "CreativAI studio HTTP gateway")]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "STUDIO_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init();
    let _log_guard = observability::init_observability(&observability::LogSettings::from_env());
    let cli = Cli::parse();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    let state = AppState::from_config(config).context("failed to build provider clients")?;
    let video = state.video_enabled();
    let vision = state.vision_enabled();

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind to {}", cli.bind))?;
    info!(
        event = "server.listening",
        domain = "http",
        addr = %cli.bind,
        video,
        vision,
        "studio server listening on http://{}",
        cli.bind
    );

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    info!(event = "server.stopped", domain = "http");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
