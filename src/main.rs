//! Argonaut - conversational operations for Argo CD
//!
//! A Rust backend that lets an LLM inspect and deploy Argo CD applications
//! through tool calls, streaming every step to the client over SSE.

mod api;
mod batch_sync;
mod config;
mod control_plane;
mod engine;
mod llm;
mod relay;
mod source_control;
mod system_prompt;
mod tools;

#[cfg(test)]
mod testing;

use api::{create_router, AppState};
use config::ServerConfig;
use control_plane::{ArgoClient, ControlPlane, TokenCache};
use llm::ModelRegistry;
use source_control::{GitHubClient, SourceControl};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "argonaut=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!(
            "No LLM API keys configured. Set ANTHROPIC_API_KEY, OPENAI_API_KEY, GEMINI_API_KEY or LLM_GATEWAY."
        );
    }

    // Collaborators
    let control_plane: Option<Arc<dyn ControlPlane>> = match &config.argo {
        Some(argo) => {
            let client = ArgoClient::new(argo, Arc::new(TokenCache::new()))?;
            tracing::info!(url = %argo.url, insecure = argo.insecure, "ArgoCD configured");
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("ARGOCD_URL not set; chat is disabled until it is configured");
            None
        }
    };

    let source_control: Option<Arc<dyn SourceControl>> = match &config.git {
        Some(git) => {
            let client = GitHubClient::new(git)?;
            tracing::info!(url = %git.url, owner = ?git.default_owner, "GitHub configured");
            Some(Arc::new(client))
        }
        None => None,
    };

    // Create application state
    let state = AppState::new(
        llm_registry,
        control_plane,
        source_control,
        config.max_tool_output,
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Argonaut server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
