//! HTTP request handlers

use super::sse::frame_stream;
use super::types::{ChatRequest, ErrorResponse, ModelsResponse, ToolsResponse};
use super::AppState;
use crate::engine::ConversationEngine;
use crate::relay::{spawn_chat, ChatRun};
use crate::system_prompt::build_system_prompt;
use crate::tools::ToolContext;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat turn streamed as SSE
        .route("/api/chat", post(chat))
        // Model info
        .route("/api/models", get(list_models))
        // Advertised tools
        .route("/api/tools", get(list_tools))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    if req.messages.is_empty() {
        return Err(AppError::BadRequest(
            "messages must not be empty".to_string(),
        ));
    }

    let model_id = req
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.llm_registry.default_model_id().to_string());
    let llm = state
        .llm_registry
        .get(&model_id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown model: {model_id}")))?;

    let control_plane = state.control_plane.clone().ok_or_else(|| {
        AppError::Unavailable("ArgoCD is not configured".to_string())
    })?;

    tracing::info!(
        model = %model_id,
        messages = req.messages.len(),
        "Starting chat"
    );

    let cancel = CancellationToken::new();
    let run = ChatRun {
        engine: ConversationEngine::new(llm, state.tools.definitions()),
        tools: state.tools.clone(),
        context: ToolContext::new(cancel.clone(), control_plane, state.source_control.clone()),
        system_prompt: build_system_prompt(req.app_context.as_deref()),
        messages: req.messages,
    };

    let frames = spawn_chat(run, cancel.clone());
    Ok(frame_stream(frames, cancel).into_response())
}

// ============================================================
// Discovery
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_model_info(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

async fn list_tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.tools.definitions(),
    })
}

async fn get_version() -> &'static str {
    concat!("argonaut ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
