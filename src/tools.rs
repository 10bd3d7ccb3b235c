//! Tool registry and executor
//!
//! Tools are stateless singletons; everything a call needs arrives through
//! `ToolContext`. The registry is the single entry point: it validates
//! required arguments, runs the tool, renders and truncates the output, and
//! turns every failure into a `{"error": ...}` string for the model.

mod args;
mod batch_sync;
mod control_plane;
mod source_control;
mod suggestions;

pub use batch_sync::BatchSyncTool;
pub use control_plane::{
    AppTool, ApplicationLogsTool, ListTool, RestartApplicationTool, RollbackApplicationTool,
};
pub use source_control::{
    CreatePullRequestTool, GetPullRequestTool, GetWorkflowRunTool, ListBranchesTool,
    ListPullRequestsTool, ListWorkflowRunsTool, MergePullRequestTool, SearchRepositoriesTool,
};
pub use suggestions::{suggestions_for, Suggestion};

use crate::batch_sync::{BatchSyncError, ProgressSink};
use crate::control_plane::{ControlPlane, ControlPlaneError};
use crate::llm::{ToolDefinition, ToolParameters};
use crate::source_control::{SourceControl, SourceControlError};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_OUTPUT: usize = 4000;
pub const TRUNCATION_MARKER: &str = "\n\n... [output truncated]";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Source control is not configured")]
    SourceControlUnavailable,

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error(transparent)]
    SourceControl(#[from] SourceControlError),

    #[error(transparent)]
    BatchSync(#[from] BatchSyncError),

    #[error("Failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

/// What a tool produced, before rendering
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    pub fn json(value: impl serde::Serialize) -> Result<Self, ToolError> {
        Ok(ToolOutput::Json(serde_json::to_value(value)?))
    }

    /// Text passes through; structured output is pretty-printed
    pub fn render(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// All context needed for a tool invocation.
///
/// Created fresh for each tool call; tools derive everything from it.
#[derive(Clone)]
pub struct ToolContext {
    /// Cancellation signal for long-running operations
    pub cancel: CancellationToken,

    /// Id of the tool call being executed
    pub call_id: String,

    control_plane: Arc<dyn ControlPlane>,
    source_control: Option<Arc<dyn SourceControl>>,
    progress: Option<ProgressSink>,
}

impl ToolContext {
    pub fn new(
        cancel: CancellationToken,
        control_plane: Arc<dyn ControlPlane>,
        source_control: Option<Arc<dyn SourceControl>>,
    ) -> Self {
        Self {
            cancel,
            call_id: String::new(),
            control_plane,
            source_control,
            progress: None,
        }
    }

    #[must_use]
    pub fn for_call(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }

    /// Attach the sink that long-running tools publish progress to
    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn control_plane(&self) -> &dyn ControlPlane {
        self.control_plane.as_ref()
    }

    pub fn source_control(&self) -> Result<&dyn SourceControl, ToolError> {
        self.source_control
            .as_deref()
            .ok_or(ToolError::SourceControlUnavailable)
    }

    pub fn progress(&self) -> Option<&ProgressSink> {
        self.progress.as_ref()
    }
}

/// Trait for tools the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &'static str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// Parameter schema; required entries are checked before `run`
    fn parameters(&self) -> ToolParameters;

    /// Execute with arguments that already passed required-argument checks
    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError>;
}

/// Collection of tools advertised to the model
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    max_output: usize,
}

impl ToolRegistry {
    /// Control-plane tools, plus source-control tools when a git server is configured
    pub fn standard(with_source_control: bool) -> Self {
        let mut tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ListTool::Applications),
            Arc::new(AppTool::Get),
            Arc::new(AppTool::Sync),
            Arc::new(RollbackApplicationTool),
            Arc::new(ApplicationLogsTool),
            Arc::new(AppTool::ResourceTree),
            Arc::new(AppTool::ManagedResources),
            Arc::new(AppTool::Events),
            Arc::new(AppTool::TerminateOperation),
            Arc::new(AppTool::Delete),
            Arc::new(RestartApplicationTool),
            Arc::new(ListTool::Projects),
            Arc::new(AppTool::GetProject),
            Arc::new(ListTool::Clusters),
            Arc::new(ListTool::Repositories),
            Arc::new(BatchSyncTool),
        ];

        if with_source_control {
            tools.extend([
                Arc::new(SearchRepositoriesTool) as Arc<dyn Tool>,
                Arc::new(ListBranchesTool),
                Arc::new(ListPullRequestsTool),
                Arc::new(GetPullRequestTool),
                Arc::new(CreatePullRequestTool),
                Arc::new(MergePullRequestTool),
                Arc::new(ListWorkflowRunsTool),
                Arc::new(GetWorkflowRunTool),
            ]);
        }

        Self {
            tools,
            max_output: DEFAULT_MAX_OUTPUT,
        }
    }

    #[must_use]
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                parameters: t.parameters(),
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Execute a tool call. Never fails: errors come back as `{"error": ...}`.
    pub async fn execute(&self, name: &str, input: &Map<String, Value>, ctx: ToolContext) -> String {
        let Some(tool) = self.find(name) else {
            tracing::warn!(tool = %name, "Unknown tool requested");
            return error_payload(&format!("Unknown tool: {name}"));
        };

        let call_id = ctx.call_id.clone();
        let start = std::time::Instant::now();
        let result = match check_required(&tool.parameters(), input) {
            Ok(()) => tool.run(Value::Object(input.clone()), ctx).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => {
                let rendered = output.render();
                tracing::info!(
                    tool = %name,
                    call_id = %call_id,
                    duration_ms = %start.elapsed().as_millis(),
                    output_chars = rendered.chars().count(),
                    "Tool completed"
                );
                truncate_output(&rendered, self.max_output)
            }
            Err(e) => {
                tracing::warn!(
                    tool = %name,
                    call_id = %call_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e,
                    "Tool failed"
                );
                error_payload(&e.to_string())
            }
        }
    }
}

/// Every required parameter must be present, non-null, and not an empty string
fn check_required(params: &ToolParameters, input: &Map<String, Value>) -> Result<(), ToolError> {
    for name in &params.required {
        match input.get(name) {
            None | Some(Value::Null) => return Err(ToolError::MissingArgument(name.clone())),
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(ToolError::MissingArgument(name.clone()))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

pub fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}

/// Cut `output` so the result, marker included, is at most `max` characters
pub fn truncate_output(output: &str, max: usize) -> String {
    if output.chars().count() <= max {
        return output.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    let keep = max.saturating_sub(marker_len);
    if keep == 0 {
        // Limit smaller than the marker itself: keep its tail
        return TRUNCATION_MARKER
            .chars()
            .skip(marker_len.saturating_sub(max))
            .collect();
    }
    let mut truncated: String = output.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
