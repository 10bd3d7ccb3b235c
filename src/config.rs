//! Process configuration, read once from the environment at startup

use crate::control_plane::{ArgoServerConfig, ControlPlaneError};
use crate::llm::LlmConfig;
use crate::source_control::GitServerConfig;
use crate::tools::DEFAULT_MAX_OUTPUT;

pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_tool_output: usize,
    pub llm: LlmConfig,
    /// `None` when `ARGOCD_URL` is unset; chat is then unavailable
    pub argo: Option<ArgoServerConfig>,
    /// `None` when `GITHUB_TOKEN` is unset; git tools are then not offered
    pub git: Option<GitServerConfig>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ControlPlaneError> {
        Ok(Self {
            port: parse_env("ARGONAUT_PORT").unwrap_or(DEFAULT_PORT),
            max_tool_output: parse_env("ARGONAUT_MAX_TOOL_OUTPUT").unwrap_or(DEFAULT_MAX_OUTPUT),
            llm: LlmConfig::from_env(),
            argo: ArgoServerConfig::from_env()?,
            git: GitServerConfig::from_env(),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = %name, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}
