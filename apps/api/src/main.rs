mod analysis;
mod config;
mod errors;
mod extraction;
mod llm_client;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Contract Review API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize scoring backend (KeywordRiskScorer by default; swap via SCORER_BACKEND)
    let state = AppState::from_config(config.clone())?;
    match &state.llm {
        Some(_) => info!(
            "Scoring backend: {} (model: {})",
            state.scorer.backend(),
            llm_client::MODEL
        ),
        None => info!("Scoring backend: {}", state.scorer.backend()),
    }
    info!(
        "Max upload {} bytes, up to {} scoring attempts per contract",
        config.max_upload_bytes, config.max_scoring_attempts
    );

    // Build router
    // TODO: restrict CORS origins once the web client's domain is fixed
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
