//! Provider-agnostic agentic conversation loop
//!
//! One loop drives every backend: send the conversation, stream text, collect
//! tool calls, resolve them in issue order, feed results back, repeat. Backend
//! differences live entirely in the `LlmService` translators; the only signal
//! the loop reads from them is `LlmResponse::wants_continue`.

use crate::llm::{
    ContentBlock, LlmError, LlmMessage, LlmRequest, LlmService, MessageRole, SystemContent,
    ToolDefinition, Usage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default bound on model calls per chat
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// A caller-supplied conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
}

/// A structured request from the model to invoke a named operation.
/// The id is scoped to one model turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Map<String, Value>,
}

impl ToolCall {
    fn from_tool_use(id: &str, name: &str, input: &Value) -> Self {
        let input = match input {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        Self {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }
    }
}

/// Events emitted while a chat runs
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Text(String),
    ToolCall(ToolCall),
    Done,
}

/// Resolves one tool call into the string fed back to the model.
/// Resolution never fails; errors are rendered into the result.
#[async_trait]
pub trait ToolResolver: Send + Sync {
    async fn resolve(&self, call: &ToolCall) -> String;
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("Chat cancelled")]
    Cancelled,
}

/// Summary of a finished chat
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub model_calls: usize,
    pub tool_calls: usize,
    pub usage: Usage,
}

pub struct ConversationEngine {
    llm: Arc<dyn LlmService>,
    tools: Vec<ToolDefinition>,
    max_iterations: usize,
}

impl ConversationEngine {
    pub fn new(llm: Arc<dyn LlmService>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            llm,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// Run the conversation to completion.
    ///
    /// Every text fragment and tool call is passed to `on_event` as soon as the
    /// response carrying it arrives; `Done` is emitted exactly once, last, on
    /// success. On error nothing further is emitted.
    pub async fn chat<F>(
        &self,
        messages: &[ConversationMessage],
        system_prompt: Option<&str>,
        mut on_event: F,
        resolver: &dyn ToolResolver,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, EngineError>
    where
        F: FnMut(StreamEvent) + Send,
    {
        let system = system_prompt
            .filter(|s| !s.is_empty())
            .map(|s| vec![SystemContent::new(s)])
            .unwrap_or_default();

        let mut history: Vec<LlmMessage> = messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| LlmMessage {
                role: m.role,
                content: vec![ContentBlock::text(m.content.clone())],
            })
            .collect();

        let mut outcome = ChatOutcome::default();

        while outcome.model_calls < self.max_iterations {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let request = LlmRequest {
                system: system.clone(),
                messages: history.clone(),
                tools: self.tools.clone(),
                max_tokens: None,
            };

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(EngineError::Cancelled),
                result = self.llm.complete(&request) => result?,
            };
            outcome.model_calls += 1;
            outcome.usage.input_tokens += response.usage.input_tokens;
            outcome.usage.output_tokens += response.usage.output_tokens;

            // Emit in content order so text and calls interleave as the model wrote them
            let mut calls = Vec::new();
            for block in &response.content {
                match block {
                    ContentBlock::Text { text } if !text.is_empty() => {
                        on_event(StreamEvent::Text(text.clone()));
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        let call = ToolCall::from_tool_use(id, name, input);
                        on_event(StreamEvent::ToolCall(call.clone()));
                        calls.push(call);
                    }
                    _ => {}
                }
            }

            if calls.is_empty() {
                on_event(StreamEvent::Done);
                return Ok(outcome);
            }

            history.push(LlmMessage {
                role: MessageRole::Assistant,
                content: response.content,
            });

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                tracing::debug!(tool = %call.name, id = %call.id, "Resolving tool call");
                let output = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(EngineError::Cancelled),
                    output = resolver.resolve(call) => output,
                };
                results.push(ContentBlock::tool_result(&call.id, &call.name, output));
            }
            outcome.tool_calls += calls.len();

            history.push(LlmMessage {
                role: MessageRole::User,
                content: results,
            });

            if !response.wants_continue {
                on_event(StreamEvent::Done);
                return Ok(outcome);
            }
        }

        tracing::warn!(
            model = %self.llm.model_id(),
            max_iterations = self.max_iterations,
            "Tool loop hit iteration limit"
        );
        on_event(StreamEvent::Done);
        Ok(outcome)
    }
}
