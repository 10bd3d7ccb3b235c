//! reqwest-backed Argo CD REST client

use super::{
    AppSummary, ClusterSummary, ControlPlane, ControlPlaneError, ProjectSummary,
    RepositorySummary, RestartTarget, RestartedResource, TokenCache, SESSION_TTL,
};
use crate::batch_sync::ApplicationFleet;
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// API error bodies are cut to this many characters
const MAX_ERROR_BODY_CHARS: usize = 500;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub enum ArgoAuth {
    Token(String),
    Credentials { username: String, password: String },
}

#[derive(Debug, Clone)]
pub struct ArgoServerConfig {
    pub url: String,
    pub auth: ArgoAuth,
    /// Skip TLS verification for self-signed servers
    pub insecure: bool,
}

impl ArgoServerConfig {
    /// Reads `ARGOCD_*`. `Ok(None)` when no server URL is set.
    pub fn from_env() -> Result<Option<Self>, ControlPlaneError> {
        let Ok(url) = std::env::var("ARGOCD_URL") else {
            return Ok(None);
        };

        let auth = if let Ok(token) = std::env::var("ARGOCD_TOKEN") {
            ArgoAuth::Token(token)
        } else {
            match (
                std::env::var("ARGOCD_USERNAME"),
                std::env::var("ARGOCD_PASSWORD"),
            ) {
                (Ok(username), Ok(password)) => ArgoAuth::Credentials { username, password },
                _ => {
                    return Err(ControlPlaneError::Config(
                        "set ARGOCD_TOKEN or ARGOCD_USERNAME and ARGOCD_PASSWORD".to_string(),
                    ))
                }
            }
        };

        let insecure = std::env::var("ARGOCD_INSECURE")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Ok(Some(Self {
            url,
            auth,
            insecure,
        }))
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
}

pub struct ArgoClient {
    http: reqwest::Client,
    base_url: Url,
    /// `base_url` without trailing slash, used in token cache keys
    server_key: String,
    auth: ArgoAuth,
    tokens: Arc<TokenCache>,
}

impl ArgoClient {
    pub fn new(config: &ArgoServerConfig, tokens: Arc<TokenCache>) -> Result<Self, ControlPlaneError> {
        let server_key = config.url.trim_end_matches('/').to_string();
        let base_url = Url::parse(&server_key)
            .map_err(|e| ControlPlaneError::InvalidUrl(format!("{}: {e}", config.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ControlPlaneError::InvalidUrl(config.url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            http,
            base_url,
            server_key,
            auth: config.auth.clone(),
            tokens,
        })
    }

    /// Build `{base}/api/v1/{segments...}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ControlPlaneError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ControlPlaneError::InvalidUrl(self.server_key.clone()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    async fn token(&self) -> Result<String, ControlPlaneError> {
        let (username, password) = match &self.auth {
            ArgoAuth::Token(token) => return Ok(token.clone()),
            ArgoAuth::Credentials { username, password } => (username, password),
        };

        let key = TokenCache::key(&self.server_key, username);
        if let Some(token) = self.tokens.get(&key) {
            return Ok(token);
        }

        tracing::debug!(server = %self.server_key, username = %username, "Logging in to ArgoCD");
        let response = self
            .http
            .post(self.endpoint(&["session"])?)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Login {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let session: SessionResponse = response.json().await?;
        self.tokens.insert(key, session.token.clone(), SESSION_TTL);
        Ok(session.token)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<reqwest::Response, ControlPlaneError> {
        let token = self.token().await?;
        let mut request = self.http.request(method, url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                if let ArgoAuth::Credentials { username, .. } = &self.auth {
                    self.tokens
                        .invalidate(&TokenCache::key(&self.server_key, username));
                }
            }
            let body = response.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Api {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        Ok(response)
    }

    async fn get_json(&self, segments: &[&str]) -> Result<Value, ControlPlaneError> {
        let url = self.endpoint(segments)?;
        Ok(self.send(Method::GET, url, &[], None).await?.json().await?)
    }

    async fn items(&self, collection: &str) -> Result<Vec<Value>, ControlPlaneError> {
        let data = self.get_json(&[collection]).await?;
        Ok(match data.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        })
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

fn text_at(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Render Argo's NDJSON log stream as `[HH:MM:SS] pod: line`.
/// Lines that are not log entries pass through unchanged.
pub fn render_log_lines(ndjson: &str) -> String {
    ndjson
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let Ok(parsed) = serde_json::from_str::<Value>(line) else {
                return line.to_string();
            };
            let Some(result) = parsed.get("result").filter(|r| r.is_object()) else {
                return line.to_string();
            };
            let ts = result
                .get("timeStamp")
                .and_then(Value::as_str)
                .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&chrono::Utc).format("%H:%M:%S").to_string())
                .unwrap_or_default();
            let pod = result.get("podName").and_then(Value::as_str).unwrap_or("");
            let content = result.get("content").and_then(Value::as_str).unwrap_or("");
            format!("[{ts}] {pod}: {content}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ApplicationFleet for ArgoClient {
    async fn list_applications(&self) -> Result<Vec<AppSummary>, ControlPlaneError> {
        let items = self.items("applications").await?;
        Ok(items.iter().map(AppSummary::from_application).collect())
    }

    async fn sync_application(&self, name: &str) -> Result<Value, ControlPlaneError> {
        let url = self.endpoint(&["applications", name, "sync"])?;
        Ok(self
            .send(Method::POST, url, &[], Some(json!({})))
            .await?
            .json()
            .await?)
    }

    async fn application_status(&self, name: &str) -> Result<AppSummary, ControlPlaneError> {
        let app = self.get_application(name).await?;
        Ok(AppSummary::from_application(&app))
    }
}

#[async_trait]
impl ControlPlane for ArgoClient {
    fn as_fleet(&self) -> &dyn ApplicationFleet {
        self
    }

    async fn get_application(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.get_json(&["applications", name]).await
    }

    async fn rollback_application(&self, name: &str, id: i64) -> Result<Value, ControlPlaneError> {
        let url = self.endpoint(&["applications", name, "rollback"])?;
        Ok(self
            .send(Method::POST, url, &[], Some(json!({ "id": id })))
            .await?
            .json()
            .await?)
    }

    async fn application_logs(
        &self,
        name: &str,
        container: Option<&str>,
        tail_lines: u32,
    ) -> Result<String, ControlPlaneError> {
        let url = self.endpoint(&["applications", name, "logs"])?;
        let mut query = Vec::new();
        if let Some(container) = container {
            query.push(("container", container.to_string()));
        }
        query.push(("tailLines", tail_lines.to_string()));
        query.push(("follow", "false".to_string()));

        let text = self.send(Method::GET, url, &query, None).await?.text().await?;
        Ok(render_log_lines(&text))
    }

    async fn resource_tree(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.get_json(&["applications", name, "resource-tree"]).await
    }

    async fn managed_resources(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.get_json(&["applications", name, "managed-resources"])
            .await
    }

    async fn application_events(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.get_json(&["applications", name, "events"]).await
    }

    async fn terminate_operation(&self, name: &str) -> Result<Value, ControlPlaneError> {
        let url = self.endpoint(&["applications", name, "operation"])?;
        Ok(self.send(Method::DELETE, url, &[], None).await?.json().await?)
    }

    async fn delete_application(&self, name: &str) -> Result<Value, ControlPlaneError> {
        let url = self.endpoint(&["applications", name])?;
        Ok(self.send(Method::DELETE, url, &[], None).await?.json().await?)
    }

    async fn restart_application(
        &self,
        name: &str,
        target: Option<&RestartTarget>,
    ) -> Result<Vec<RestartedResource>, ControlPlaneError> {
        let app = self.get_application(name).await?;
        let namespace = text_at(&app, "/spec/destination/namespace")
            .unwrap_or_else(|| "default".to_string());

        let tree = self.resource_tree(name).await?;
        let nodes = tree
            .get("nodes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let workloads: Vec<&Value> = nodes
            .iter()
            .filter(|node| {
                matches!(
                    node.get("kind").and_then(Value::as_str),
                    Some("Deployment" | "StatefulSet")
                )
            })
            .filter(|node| match target {
                None => true,
                Some(t) => {
                    node.get("name").and_then(Value::as_str) == Some(t.name.as_str())
                        && t.kind
                            .as_deref()
                            .map_or(true, |k| node.get("kind").and_then(Value::as_str) == Some(k))
                }
            })
            .collect();

        if workloads.is_empty() {
            return Err(match target {
                None => ControlPlaneError::NoRestartTargets(name.to_string()),
                Some(t) => ControlPlaneError::ResourceNotFound {
                    app: name.to_string(),
                    resource: t.name.clone(),
                },
            });
        }

        let mut restarted = Vec::with_capacity(workloads.len());
        for node in workloads {
            let kind = text_at(node, "/kind").unwrap_or_default();
            let resource = text_at(node, "/name").unwrap_or_default();
            let group = text_at(node, "/group")
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| "apps".to_string());
            let node_namespace = text_at(node, "/namespace")
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| namespace.clone());

            let url = self.endpoint(&["applications", name, "resource", "actions"])?;
            let query = [
                ("name", resource.clone()),
                ("namespace", node_namespace),
                ("resourceName", resource.clone()),
                ("group", group),
                ("kind", kind.clone()),
                ("version", "v1".to_string()),
                ("patchType", "application/merge-patch+json".to_string()),
            ];
            self.send(Method::POST, url, &query, Some(json!({ "action": "restart" })))
                .await?;

            tracing::info!(app = %name, kind = %kind, resource = %resource, "Restarted workload");
            restarted.push(RestartedResource {
                kind,
                name: resource,
                status: "restarted".to_string(),
            });
        }

        Ok(restarted)
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, ControlPlaneError> {
        let items = self.items("projects").await?;
        Ok(items
            .iter()
            .map(|p| ProjectSummary {
                name: text_at(p, "/metadata/name").unwrap_or_default(),
                description: text_at(p, "/spec/description").unwrap_or_default(),
            })
            .collect())
    }

    async fn get_project(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.get_json(&["projects", name]).await
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterSummary>, ControlPlaneError> {
        let items = self.items("clusters").await?;
        Ok(items
            .iter()
            .map(|c| ClusterSummary {
                server: text_at(c, "/server").unwrap_or_default(),
                name: text_at(c, "/name").unwrap_or_default(),
                status: text_at(c, "/connectionState/status"),
                server_version: text_at(c, "/info/serverVersion"),
                applications_count: c
                    .pointer("/info/applicationsCount")
                    .and_then(Value::as_u64),
            })
            .collect())
    }

    async fn list_repositories(&self) -> Result<Vec<RepositorySummary>, ControlPlaneError> {
        let items = self.items("repositories").await?;
        Ok(items
            .iter()
            .map(|r| RepositorySummary {
                repo: text_at(r, "/repo").unwrap_or_default(),
                kind: text_at(r, "/type"),
                status: text_at(r, "/connectionState/status"),
            })
            .collect())
    }
}
