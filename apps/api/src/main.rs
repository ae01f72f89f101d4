mod config;
mod errors;
mod generation;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::errors::panic_response;
use crate::generation::assembler::validate_directory;
use crate::generation::capability::CapabilityRegistry;
use crate::generation::flow::GenerationFlow;
use crate::llm_client::GeminiClient;
use crate::routes::{build_router, cors_layer};
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

    info!("Starting Clarity API v{}", env!("CARGO_PKG_VERSION"));

    // Capability registry: prompt directories + per-capability model parameters
    let registry = CapabilityRegistry::new(&config.prompts_dir, config.safety, |capability| {
        Some(config.params(capability))
    })
    .context("Invalid capability configuration")?;

    for settings in registry.iter() {
        if validate_directory(&settings.prompt_dir) {
            info!(
                "{}: prompts from {} (temperature {}, max tokens {})",
                settings.capability,
                settings.prompt_dir.display(),
                settings.params.temperature,
                settings.params.max_output_tokens
            );
        } else {
            warn!(
                "{}: no prompt fragments in {}; running without a system prompt",
                settings.capability,
                settings.prompt_dir.display()
            );
        }
    }

    // Initialize model client
    let model = GeminiClient::new(
        &config.model_api_base,
        &config.model_name,
        &config.google_api_key,
        config.model_timeout,
    )
    .context("Failed to build model HTTP client")?;
    info!("Model client initialized (model: {})", model.model());

    let flow = GenerationFlow::new(registry, Arc::new(model), config.on_failure);
    info!("Failure policy: {:?}", flow.on_failure());

    let state = AppState {
        flow: Arc::new(flow),
    };

    // Build router
    let cors = cors_layer(&config.allowed_origins).context("Invalid ALLOWED_ORIGINS")?;
    info!("CORS origins: {}", config.allowed_origins.join(", "));

    let app = build_router(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
