use anyhow::{Context, Result};
use clap::Parser;
use consult_relay::{AppState, Config, DeepgramConnector, GeminiAnalyst};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "consult-relay", about = "Real-time consultation transcription relay")]
struct Args {
    /// Path to the configuration file (extension optional)
    #[arg(long, default_value = "config/consult-relay")]
    config: String,

    /// Override the HTTP port from the configuration
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} starting", cfg.service.name);
    if cfg.stt.api_key.is_none() {
        warn!("No STT API key configured; transcription sessions will fail to open");
    }
    if cfg.analysis.api_key.is_none() {
        warn!("No analysis API key configured; transcript analysis will be unavailable");
    }

    let stt = Arc::new(DeepgramConnector::new(cfg.stt.api_key.clone()));
    let analysis = Arc::new(GeminiAnalyst::with_endpoint(
        cfg.analysis.api_key.clone(),
        cfg.analysis.base_url.clone(),
        cfg.analysis.model.clone(),
    ));

    let state = AppState::new(stt, analysis, cfg.stt_options(), cfg.relay_config());
    let router = consult_relay::create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .context("HTTP server error")?;

    Ok(())
}
