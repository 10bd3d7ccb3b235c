//! Event relay between a running chat and its SSE consumer
//!
//! A chat runs on its own task and publishes [`Frame`]s into one channel, in
//! emission order. Tool progress from the orchestrator goes through the same
//! channel, so a consumer sees `tool_call_start`, any `tool_call_progress`,
//! then `tool_call_result` for each call.

use crate::batch_sync::{BatchSyncProgress, ProgressSink};
use crate::engine::{
    ConversationEngine, ConversationMessage, EngineError, StreamEvent, ToolCall, ToolResolver,
};
use crate::tools::{suggestions_for, Suggestion, ToolContext, ToolRegistry};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One wire event
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text {
        text: String,
    },
    ToolCallStart {
        id: String,
        name: String,
        input: Map<String, Value>,
    },
    ToolCallProgress {
        id: String,
        progress: BatchSyncProgress,
    },
    ToolCallResult {
        id: String,
        name: String,
        output: String,
        suggestions: &'static [Suggestion],
    },
    Error {
        error: String,
    },
    Done,
}

impl Frame {
    /// SSE `event:` tag
    pub fn event_name(&self) -> &'static str {
        match self {
            Frame::Text { .. } => "text",
            Frame::ToolCallStart { .. } => "tool_call_start",
            Frame::ToolCallProgress { .. } => "tool_call_progress",
            Frame::ToolCallResult { .. } => "tool_call_result",
            Frame::Error { .. } => "error",
            Frame::Done => "done",
        }
    }

    /// SSE `data:` payload
    pub fn data(&self) -> Value {
        match self {
            Frame::Text { text } => json!({ "text": text }),
            Frame::ToolCallStart { id, name, input } => {
                json!({ "id": id, "name": name, "input": input })
            }
            Frame::ToolCallProgress { id, progress } => json!({ "id": id, "progress": progress }),
            Frame::ToolCallResult {
                id,
                name,
                output,
                suggestions,
            } => {
                let mut data = json!({ "id": id, "name": name, "output": output });
                if !suggestions.is_empty() {
                    data["suggestions"] = json!(suggestions);
                }
                data
            }
            Frame::Error { error } => json!({ "error": error }),
            Frame::Done => json!({}),
        }
    }

    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Done | Frame::Error { .. })
    }
}

impl From<StreamEvent> for Frame {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::Text(text) => Frame::Text { text },
            StreamEvent::ToolCall(call) => Frame::ToolCallStart {
                id: call.id,
                name: call.name,
                input: call.input,
            },
            StreamEvent::Done => Frame::Done,
        }
    }
}

pub type FrameSender = mpsc::UnboundedSender<Frame>;

/// Resolves tool calls through the registry and reports them on the relay
struct RelayResolver {
    tools: Arc<ToolRegistry>,
    context: ToolContext,
    frames: FrameSender,
}

/// Error payloads carry no follow-ups
fn is_error_output(output: &str) -> bool {
    serde_json::from_str::<Map<String, Value>>(output)
        .is_ok_and(|map| map.len() == 1 && map.contains_key("error"))
}

#[async_trait]
impl ToolResolver for RelayResolver {
    async fn resolve(&self, call: &ToolCall) -> String {
        let frames = self.frames.clone();
        let id = call.id.clone();
        let sink: ProgressSink = Arc::new(move |progress: BatchSyncProgress| {
            let _ = frames.send(Frame::ToolCallProgress {
                id: id.clone(),
                progress,
            });
        });

        let context = self.context.clone().for_call(&call.id).with_progress(sink);
        let output = self.tools.execute(&call.name, &call.input, context).await;

        let suggestions: &'static [Suggestion] = if is_error_output(&output) {
            &[]
        } else {
            suggestions_for(&call.name)
        };
        let _ = self.frames.send(Frame::ToolCallResult {
            id: call.id.clone(),
            name: call.name.clone(),
            output: output.clone(),
            suggestions,
        });
        output
    }
}

/// Everything one chat request needs
pub struct ChatRun {
    pub engine: ConversationEngine,
    pub tools: Arc<ToolRegistry>,
    pub context: ToolContext,
    pub system_prompt: String,
    pub messages: Vec<ConversationMessage>,
}

impl ChatRun {
    /// Drive the chat, publishing every frame. Ends with `done` or `error`,
    /// except on cancellation, where the consumer is already gone.
    pub async fn run(self, frames: FrameSender, cancel: CancellationToken) {
        let resolver = RelayResolver {
            tools: self.tools,
            context: self.context,
            frames: frames.clone(),
        };

        let events = frames.clone();
        let on_event = move |event: StreamEvent| {
            let _ = events.send(Frame::from(event));
        };

        let result = self
            .engine
            .chat(
                &self.messages,
                Some(self.system_prompt.as_str()),
                on_event,
                &resolver,
                &cancel,
            )
            .await;

        match result {
            Ok(outcome) => {
                tracing::info!(
                    model = %self.engine.model_id(),
                    model_calls = outcome.model_calls,
                    tool_calls = outcome.tool_calls,
                    input_tokens = outcome.usage.input_tokens,
                    output_tokens = outcome.usage.output_tokens,
                    "Chat completed"
                );
            }
            Err(EngineError::Cancelled) => {
                tracing::info!(model = %self.engine.model_id(), "Chat cancelled");
            }
            Err(e) => {
                tracing::warn!(model = %self.engine.model_id(), error = %e, "Chat failed");
                let _ = frames.send(Frame::Error {
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Run the chat on its own task; frames arrive on the returned receiver
pub fn spawn_chat(run: ChatRun, cancel: CancellationToken) -> mpsc::UnboundedReceiver<Frame> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run.run(tx, cancel));
    rx
}

/// One tool call as rebuilt by [`TurnAssembler`]
#[allow(dead_code)] // Reference decoder for the frame protocol; consumers live client-side
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledToolCall {
    pub id: String,
    pub name: String,
    pub input: Map<String, Value>,
    /// Latest progress snapshot, if any
    pub progress: Option<BatchSyncProgress>,
    pub output: Option<String>,
    pub suggestions: Vec<Suggestion>,
}

/// One assistant turn as a consumer would render it
#[allow(dead_code)] // Reference decoder for the frame protocol; consumers live client-side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledTurn {
    pub text: String,
    pub tool_calls: Vec<AssembledToolCall>,
    pub error: Option<String>,
    pub done: bool,
}

/// Rebuilds an assistant turn from a frame stream
#[allow(dead_code)] // Reference decoder for the frame protocol; consumers live client-side
#[derive(Debug, Default)]
pub struct TurnAssembler {
    turn: AssembledTurn,
}

#[allow(dead_code)] // Reference decoder for the frame protocol; consumers live client-side
impl TurnAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn call_mut(&mut self, id: &str) -> Option<&mut AssembledToolCall> {
        self.turn.tool_calls.iter_mut().find(|c| c.id == id)
    }

    pub fn push(&mut self, frame: Frame) {
        match frame {
            Frame::Text { text } => self.turn.text.push_str(&text),
            Frame::ToolCallStart { id, name, input } => {
                self.turn.tool_calls.push(AssembledToolCall {
                    id,
                    name,
                    input,
                    progress: None,
                    output: None,
                    suggestions: Vec::new(),
                });
            }
            Frame::ToolCallProgress { id, progress } => {
                if let Some(call) = self.call_mut(&id) {
                    call.progress = Some(progress);
                }
            }
            Frame::ToolCallResult {
                id,
                output,
                suggestions,
                ..
            } => {
                if let Some(call) = self.call_mut(&id) {
                    call.output = Some(output);
                    call.suggestions = suggestions.to_vec();
                }
            }
            Frame::Error { error } => self.turn.error = Some(error),
            Frame::Done => self.turn.done = true,
        }
    }

    pub fn turn(&self) -> &AssembledTurn {
        &self.turn
    }

    pub fn finish(self) -> AssembledTurn {
        self.turn
    }
}
