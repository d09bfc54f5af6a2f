#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod api;
mod config;

use anyhow::Context;
use axum::http::{Method, header};
use tower_http::cors::CorsLayer;

use api::AppState;
use config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing logger
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,promptrelay_server=debug".into()),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting PromptRelay server");

    let config = ServerConfig::from_env();
    let state = AppState::from_env().context("relay startup failed")?;

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = api::router(state, &config.chat_path).layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    tracing::info!(addr = %config.bind_addr(), path = %config.chat_path, "relay listening");

    axum::serve(listener, app)
        .await
        .context("axum server exited")?;

    Ok(())
}
