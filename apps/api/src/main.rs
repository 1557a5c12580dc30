mod augment;
mod chat;
mod config;
mod errors;
mod jobs;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::augment::JobSearchMiddleware;
use crate::config::Config;
use crate::jobs::catalog::JobCatalog;
use crate::llm_client::{LanguageModel, LlmClient};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Job Chat API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm: Arc<dyn LanguageModel> = Arc::new(LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
    )?);
    info!(
        "LLM client initialized (chat model: {}, classifier model: {})",
        config.chat_model, config.classifier_model
    );

    // Load the job catalog once; shared read-only across requests
    let catalog = match &config.job_catalog_path {
        Some(path) => JobCatalog::from_json_file(path)?,
        None => JobCatalog::builtin(),
    };
    if catalog.is_empty() {
        warn!("Job catalog is empty; job searches will return no listings");
    } else {
        info!("Job catalog loaded ({} listings)", catalog.len());
    }

    let middleware = JobSearchMiddleware::new(
        llm.clone(),
        Arc::new(catalog),
        config.classifier_model.clone(),
    );

    // Build app state
    let state = AppState {
        llm,
        middleware,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
