use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

mod app;
mod http;
mod reload;

/// Multi-instance message bridge gateway.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML config file. Falls back to WXBRIDGE_CONFIG, then "wxbridge.toml".
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wxbridge_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("WXBRIDGE_CONFIG").ok());
    let config = wxbridge_core::BridgeConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        wxbridge_core::BridgeConfig::default()
    });

    let store = Arc::new(wxbridge_store::Store::open(&config.database.path)?);
    let state = Arc::new(app::AppState::build(&config, store).await?);
    state.apply_fixed_listeners_at_startup().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = state.spawn_all(shutdown_rx);

    let router = app::build_router(state.clone());
    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!(%addr, "wxbridge gateway listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    server.await?;

    info!("stopping background loops");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
