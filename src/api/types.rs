//! API request and response types

use crate::engine::ConversationMessage;
use crate::llm::ToolDefinition;
use serde::{Deserialize, Serialize};

/// Request to run one chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ConversationMessage>,
    /// Model id; the registry default when absent
    #[serde(default)]
    pub model: Option<String>,
    /// Snapshot of the application list, appended to the system prompt
    #[serde(default, alias = "appContext")]
    pub app_context: Option<String>,
}

/// Model information with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub provider_label: String,
    pub label: String,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Response for tool list
#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDefinition>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
