//! Argo CD tools

use super::args::{self, non_empty};
use super::{Tool, ToolContext, ToolError, ToolOutput};
use crate::control_plane::RestartTarget;
use crate::llm::{ParamSpec, ToolParameters};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_TAIL_LINES: u32 = 100;

/// Tools that take no arguments and list one kind of resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTool {
    Applications,
    Projects,
    Clusters,
    Repositories,
}

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &'static str {
        match self {
            ListTool::Applications => "list_applications",
            ListTool::Projects => "list_projects",
            ListTool::Clusters => "list_clusters",
            ListTool::Repositories => "list_repositories",
        }
    }

    fn description(&self) -> String {
        match self {
            ListTool::Applications => {
                "List all ArgoCD applications with their sync and health status"
            }
            ListTool::Projects => "List all ArgoCD projects",
            ListTool::Clusters => {
                "List all clusters registered in ArgoCD with their connection status"
            }
            ListTool::Repositories => "List all Git repositories registered in ArgoCD",
        }
        .to_string()
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::new()
    }

    async fn run(&self, _input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let plane = ctx.control_plane();
        match self {
            ListTool::Applications => ToolOutput::json(plane.list_applications().await?),
            ListTool::Projects => ToolOutput::json(plane.list_projects().await?),
            ListTool::Clusters => ToolOutput::json(plane.list_clusters().await?),
            ListTool::Repositories => ToolOutput::json(plane.list_repositories().await?),
        }
    }
}

/// Tools addressing one named application (or project) and nothing else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTool {
    Get,
    Sync,
    ResourceTree,
    ManagedResources,
    Events,
    TerminateOperation,
    Delete,
    GetProject,
}

#[derive(Debug, Deserialize)]
struct NameInput {
    name: String,
}

#[async_trait]
impl Tool for AppTool {
    fn name(&self) -> &'static str {
        match self {
            AppTool::Get => "get_application",
            AppTool::Sync => "sync_application",
            AppTool::ResourceTree => "get_resource_tree",
            AppTool::ManagedResources => "get_managed_resources",
            AppTool::Events => "get_application_events",
            AppTool::TerminateOperation => "terminate_operation",
            AppTool::Delete => "delete_application",
            AppTool::GetProject => "get_project",
        }
    }

    fn description(&self) -> String {
        match self {
            AppTool::Get => "Get detailed information about a specific ArgoCD application including spec, status, sync info, and history",
            AppTool::Sync => "Trigger a sync (deploy) for an application to match the desired state from Git",
            AppTool::ResourceTree => "Get the Kubernetes resource tree of an application (pods, deployments, services, replica sets)",
            AppTool::ManagedResources => "List the Kubernetes resources managed by an application with their live and desired state",
            AppTool::Events => "Get the Kubernetes events of an application, useful to diagnose failing pods",
            AppTool::TerminateOperation => "Terminate the operation currently running on an application, such as a stuck sync",
            AppTool::Delete => "Delete an ArgoCD application. WARNING: this is destructive and removes the application and its resources. Only use when the user explicitly asks for it.",
            AppTool::GetProject => "Get details of an ArgoCD project including source repositories, destinations and roles",
        }
        .to_string()
    }

    fn parameters(&self) -> ToolParameters {
        let spec = match self {
            AppTool::GetProject => ParamSpec::string("Project name"),
            _ => ParamSpec::string("Application name"),
        };
        ToolParameters::new().required("name", spec)
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let NameInput { name } = args::parse(input)?;
        let plane = ctx.control_plane();
        let value = match self {
            AppTool::Get => plane.get_application(&name).await?,
            AppTool::Sync => plane.sync_application(&name).await?,
            AppTool::ResourceTree => plane.resource_tree(&name).await?,
            AppTool::ManagedResources => plane.managed_resources(&name).await?,
            AppTool::Events => plane.application_events(&name).await?,
            AppTool::TerminateOperation => plane.terminate_operation(&name).await?,
            AppTool::Delete => plane.delete_application(&name).await?,
            AppTool::GetProject => plane.get_project(&name).await?,
        };
        Ok(ToolOutput::Json(value))
    }
}

pub struct RollbackApplicationTool;

#[derive(Debug, Deserialize)]
struct RollbackInput {
    name: String,
    #[serde(deserialize_with = "args::integer")]
    id: i64,
}

#[async_trait]
impl Tool for RollbackApplicationTool {
    fn name(&self) -> &'static str {
        "rollback_application"
    }

    fn description(&self) -> String {
        "Rollback an application to a previous deployment from its history. \
         Use get_application first to see the deployment history and available IDs."
            .to_string()
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::new()
            .required("name", ParamSpec::string("Application name"))
            .required("id", ParamSpec::string("History ID to roll back to"))
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let RollbackInput { name, id } = args::parse(input)?;
        let value = ctx.control_plane().rollback_application(&name, id).await?;
        Ok(ToolOutput::Json(value))
    }
}

pub struct ApplicationLogsTool;

#[derive(Debug, Deserialize)]
struct LogsInput {
    name: String,
    #[serde(default)]
    container: Option<String>,
    #[serde(default, deserialize_with = "args::optional_integer")]
    tail_lines: Option<i64>,
}

#[async_trait]
impl Tool for ApplicationLogsTool {
    fn name(&self) -> &'static str {
        "get_application_logs"
    }

    fn description(&self) -> String {
        "Get recent logs from the pods of an application".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::new()
            .required("name", ParamSpec::string("Application name"))
            .optional("container", ParamSpec::string("Container name (optional)"))
            .optional(
                "tail_lines",
                ParamSpec::number("Number of lines to return (default 100)"),
            )
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: LogsInput = args::parse(input)?;
        let tail_lines = input
            .tail_lines
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_TAIL_LINES);
        let container = non_empty(input.container);

        let logs = ctx
            .control_plane()
            .application_logs(&input.name, container.as_deref(), tail_lines)
            .await?;
        if logs.trim().is_empty() {
            return Ok(ToolOutput::Text("No logs available".to_string()));
        }
        Ok(ToolOutput::Text(logs))
    }
}

pub struct RestartApplicationTool;

#[derive(Debug, Deserialize)]
struct RestartInput {
    name: String,
    #[serde(default)]
    resource_name: Option<String>,
    #[serde(default)]
    resource_kind: Option<String>,
}

#[async_trait]
impl Tool for RestartApplicationTool {
    fn name(&self) -> &'static str {
        "restart_application"
    }

    fn description(&self) -> String {
        "Perform a rolling restart of all Deployments and StatefulSets of an application. \
         Pass resource_name (and optionally resource_kind) to restart a single workload."
            .to_string()
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::new()
            .required("name", ParamSpec::string("Application name"))
            .optional(
                "resource_name",
                ParamSpec::string("Restart only the workload with this name"),
            )
            .optional(
                "resource_kind",
                ParamSpec::one_of("Kind of the workload", &["Deployment", "StatefulSet"]),
            )
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: RestartInput = args::parse(input)?;
        let target = non_empty(input.resource_name).map(|name| RestartTarget {
            name,
            kind: non_empty(input.resource_kind),
        });

        let restarted = ctx
            .control_plane()
            .restart_application(&input.name, target.as_ref())
            .await?;
        Ok(ToolOutput::Json(json!({
            "application": input.name,
            "restarted": restarted,
        })))
    }
}
