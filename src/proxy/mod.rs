pub mod error;
pub mod handler;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{any, get};
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::llm::{CompositeProvider, GeminiClient};

pub use error::CompositeError;

/// Shared, read-only per-process state. Nothing here is mutated by requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn CompositeProvider>,
}

impl AppState {
    pub fn new(config: Arc<Config>, provider: Arc<dyn CompositeProvider>) -> Self {
        AppState { config, provider }
    }

    pub fn with_gemini(config: Arc<Config>) -> Self {
        let provider = Arc::new(GeminiClient::from_config(&config));
        AppState::new(config, provider)
    }
}

pub fn create_router(state: AppState) -> Router {
    let endpoint = state.config.composite_endpoint.clone();
    let body_limit = state.config.max_body_bytes;
    Router::new()
        .route("/health", get(health_check))
        .route(&endpoint, any(handler::composite_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn serve(config: Arc<Config>) -> Result<()> {
    if config.gemini_api_key().is_none() {
        warn!("GEMINI_API_KEY is not set; composite requests will fail until it is configured.");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        "Composite proxy listening on {} (endpoint={}, model={})",
        addr, config.composite_endpoint, config.gemini_image_model
    );

    let router = create_router(AppState::with_gemini(config));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Composite proxy server failed")?;

    info!("Composite proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
