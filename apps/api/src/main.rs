mod chat;
mod config;
mod errors;
mod llm_client;
mod routes;
mod rubric;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::Agent;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing Azure settings)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting rubric API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the chat agent
    let agent = Agent::azure(config.agent.clone()).context("failed to initialize chat agent")?;

    info!("Chat agent ready (model: {})", agent.config().model);

    match &config.chat_schema {
        Some(_) => info!("Structured output enabled for /api/chat"),
        None => info!("No output schema configured; /api/chat returns plain text"),
    }

    let state = AppState {
        agent,
        chat_schema: config.chat_schema.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
