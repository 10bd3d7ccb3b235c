//! HTTP API
//!
//! Chat over SSE plus a few read-only discovery endpoints.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::control_plane::ControlPlane;
use crate::llm::ModelRegistry;
use crate::source_control::SourceControl;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub llm_registry: Arc<ModelRegistry>,
    /// Chat is refused while this is unset
    pub control_plane: Option<Arc<dyn ControlPlane>>,
    pub source_control: Option<Arc<dyn SourceControl>>,
    pub tools: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(
        llm_registry: Arc<ModelRegistry>,
        control_plane: Option<Arc<dyn ControlPlane>>,
        source_control: Option<Arc<dyn SourceControl>>,
        max_tool_output: usize,
    ) -> Self {
        let tools = ToolRegistry::standard(source_control.is_some()).with_max_output(max_tool_output);
        Self {
            llm_registry,
            control_plane,
            source_control,
            tools: Arc::new(tools),
        }
    }
}
