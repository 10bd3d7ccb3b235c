//! Argo CD control plane
//!
//! The orchestrator only needs the three fleet operations in
//! [`ApplicationFleet`]; the tools need the rest of [`ControlPlane`].

mod client;
mod token_cache;

pub use client::{ArgoClient, ArgoServerConfig};
pub use token_cache::{TokenCache, SESSION_TTL};

use crate::batch_sync::ApplicationFleet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("ArgoCD API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("ArgoCD login failed: {status} {body}")]
    Login { status: u16, body: String },

    #[error("ArgoCD request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid ArgoCD URL: {0}")]
    InvalidUrl(String),

    #[error("ArgoCD configuration error: {0}")]
    Config(String),

    #[error("No Deployments or StatefulSets found in application \"{0}\"")]
    NoRestartTargets(String),

    #[error("Resource {resource} not found in application \"{app}\"")]
    ResourceNotFound { app: String, resource: String },
}

/// Compact application view: enough to answer "what is deployed and is it healthy"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub sync_status: String,
    pub health_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_message: Option<String>,
}

impl AppSummary {
    #[cfg(test)]
    pub fn is_healthy(&self) -> bool {
        self.health_status == "Healthy"
    }

    /// Build a summary from a full application resource
    pub fn from_application(app: &Value) -> Self {
        let text = |pointer: &str| {
            app.pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            name: text("/metadata/name").unwrap_or_default(),
            project: text("/spec/project"),
            sync_status: text("/status/sync/status").unwrap_or_else(|| "Unknown".to_string()),
            health_status: text("/status/health/status").unwrap_or_else(|| "Unknown".to_string()),
            health_message: text("/status/health/message"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub server: String,
    pub name: String,
    pub status: Option<String>,
    pub server_version: Option<String>,
    pub applications_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositorySummary {
    pub repo: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
}

/// Narrows a restart to one workload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartTarget {
    pub name: String,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartedResource {
    pub kind: String,
    pub name: String,
    pub status: String,
}

/// Every control-plane operation the tool catalogue exposes
#[async_trait]
pub trait ControlPlane: ApplicationFleet {
    /// View of this control plane as the orchestrator's fleet
    fn as_fleet(&self) -> &dyn ApplicationFleet;

    async fn get_application(&self, name: &str) -> Result<Value, ControlPlaneError>;

    async fn rollback_application(&self, name: &str, id: i64) -> Result<Value, ControlPlaneError>;

    async fn application_logs(
        &self,
        name: &str,
        container: Option<&str>,
        tail_lines: u32,
    ) -> Result<String, ControlPlaneError>;

    async fn resource_tree(&self, name: &str) -> Result<Value, ControlPlaneError>;

    async fn managed_resources(&self, name: &str) -> Result<Value, ControlPlaneError>;

    async fn application_events(&self, name: &str) -> Result<Value, ControlPlaneError>;

    async fn terminate_operation(&self, name: &str) -> Result<Value, ControlPlaneError>;

    async fn delete_application(&self, name: &str) -> Result<Value, ControlPlaneError>;

    /// Rolling restart of every Deployment and StatefulSet, or only `target`
    async fn restart_application(
        &self,
        name: &str,
        target: Option<&RestartTarget>,
    ) -> Result<Vec<RestartedResource>, ControlPlaneError>;

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, ControlPlaneError>;

    async fn get_project(&self, name: &str) -> Result<Value, ControlPlaneError>;

    async fn list_clusters(&self) -> Result<Vec<ClusterSummary>, ControlPlaneError>;

    async fn list_repositories(&self) -> Result<Vec<RepositorySummary>, ControlPlaneError>;
}
