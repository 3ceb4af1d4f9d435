use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voice_relay::{create_router, spawn_sweeper, AppState, Config, Engines};

#[derive(Parser, Debug)]
#[command(name = "voice-relay")]
#[command(about = "Live speech relay: transcribe once, translate and speak per listener language")]
struct Args {
    /// Config file (extension optional, missing file means defaults + env)
    #[arg(short, long, default_value = "config/voice-relay")]
    config: String,

    /// Override service.http.bind
    #[arg(long)]
    bind: Option<String>,

    /// Override service.http.port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("voice_relay=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!(
        "Languages: default={}, supported={}",
        cfg.languages.default,
        cfg.languages.voices.keys().cloned().collect::<Vec<_>>().join(",")
    );

    let engines = Engines::http(&cfg.engines).context("Failed to build engine HTTP client")?;
    let state = AppState::from_config(&cfg, engines)
        .await
        .with_context(|| format!("Failed to open artifact store at {}", cfg.artifacts.dir.display()))?;

    let _sweeper = spawn_sweeper(state.artifacts().clone(), cfg.artifacts.sweep_interval());

    let address = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("HTTP server listening on {}", address);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
