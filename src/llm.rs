//! Model backends for the operations assistant
//!
//! The conversation engine talks to Claude, OpenAI and Gemini through one
//! `LlmService` contract: a single non-streaming round that may request
//! Argo CD or GitHub tool calls. Backend wire types stay private to each
//! translator module; [`TracedProvider`] tags every round with its provider.

mod anthropic;
mod error;
mod gemini;
mod models;
mod openai;
mod registry;
mod types;

#[cfg(test)]
mod proptests;

pub use anthropic::AnthropicService;
pub use error::LlmError;
pub use gemini::GeminiService;
pub use models::{all_models, create_service, ModelDef, Provider};
pub use openai::OpenAIService;
pub use registry::{LlmConfig, ModelRegistry};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for LLM providers: one non-streaming model call
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Wraps a provider service and records one structured event per model
/// round of the tool-calling loop
pub struct TracedProvider {
    inner: Arc<dyn LlmService>,
    provider: Provider,
    model_id: String,
}

impl TracedProvider {
    pub fn new(inner: Arc<dyn LlmService>, provider: Provider) -> Self {
        let model_id = inner.model_id().to_string();
        Self {
            inner,
            provider,
            model_id,
        }
    }
}

#[async_trait]
impl LlmService for TracedProvider {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &result {
            Ok(response) => {
                let requested: Vec<&str> =
                    response.tool_uses().iter().map(|(_, name, _)| *name).collect();
                tracing::info!(
                    provider = self.provider.id(),
                    model = %self.model_id,
                    elapsed_ms = %elapsed_ms,
                    history = request.messages.len(),
                    tools_offered = request.tools.len(),
                    tools_requested = ?requested,
                    wants_continue = response.wants_continue,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Model round completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    provider = self.provider.id(),
                    model = %self.model_id,
                    elapsed_ms = %elapsed_ms,
                    history = request.messages.len(),
                    kind = ?e.kind,
                    retryable = e.kind.is_retryable(),
                    error = %e.message,
                    "Model round failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;
    use serde_json::json;

    fn request() -> LlmRequest {
        LlmRequest {
            system: vec![],
            messages: vec![LlmMessage::user_text("sync svc-a")],
            tools: vec![],
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn test_traced_provider_passes_rounds_through() {
        let mock = Arc::new(MockLlm::new("claude-sonnet-4"));
        mock.queue_tool_calls(
            "Syncing",
            &[("t1", "sync_application", json!({"name": "svc-a"}))],
            true,
        );
        mock.queue_error(LlmError::rate_limit("slow down"));
        let traced = TracedProvider::new(mock.clone(), Provider::Claude);

        assert_eq!(traced.model_id(), "claude-sonnet-4");

        let response = traced.complete(&request()).await.unwrap();
        assert!(response.wants_continue);
        assert_eq!(response.tool_uses()[0].1, "sync_application");

        let err = traced.complete(&request()).await.unwrap_err();
        assert!(err.kind.is_retryable());
        assert_eq!(mock.recorded_requests().len(), 2);
    }
}
