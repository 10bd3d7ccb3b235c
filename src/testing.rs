//! Mock implementations for testing
//!
//! These mocks enable scenario testing without real I/O.

use crate::batch_sync::ApplicationFleet;
use crate::control_plane::{
    AppSummary, ClusterSummary, ControlPlane, ControlPlaneError, ProjectSummary,
    RepositorySummary, RestartTarget, RestartedResource,
};
use crate::llm::{ContentBlock, LlmError, LlmRequest, LlmResponse, LlmService, Usage};
use crate::source_control::{
    Branch, MergeMethod, MergeResult, NewPullRequest, PullRequest, PullRequestDetail,
    Repository, SourceControl, SourceControlError, WorkflowRun,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;

// ============================================================================
// Mock LLM
// ============================================================================

/// Mock LLM service that returns queued responses
pub struct MockLlm {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_text(&self, text: &str, wants_continue: bool) {
        self.queue_response(LlmResponse {
            content: vec![ContentBlock::text(text)],
            wants_continue,
            usage: Usage::default(),
        });
    }

    /// Queue a response carrying `(id, name, input)` tool calls after optional text
    pub fn queue_tool_calls(&self, text: &str, calls: &[(&str, &str, Value)], wants_continue: bool) {
        let mut content = Vec::new();
        if !text.is_empty() {
            content.push(ContentBlock::text(text));
        }
        for (id, name, input) in calls {
            content.push(ContentBlock::tool_use(*id, *name, input.clone()));
        }
        self.queue_response(LlmResponse {
            content,
            wants_continue,
            usage: Usage::default(),
        });
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlm {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock fleet / control plane
// ============================================================================

/// Scripted health behavior for one app
#[derive(Debug, Clone, Copy)]
pub enum Health {
    Healthy,
    /// Healthy once the app has been synced this many times
    HealthyAfterSyncs(usize),
    /// Healthy from the nth status read on
    HealthyAfterPolls(usize),
    Never,
    PollError,
    /// The first n status reads fail, later reads report Healthy
    ErrorThenHealthy(usize),
}

#[derive(Default)]
struct AppState {
    syncs: usize,
    polls: usize,
    failing_syncs: usize,
    last_sync: Option<Instant>,
}

/// In-memory control plane with scripted health
pub struct MockFleet {
    apps: Vec<String>,
    health: HashMap<String, Health>,
    state: Mutex<HashMap<String, AppState>>,
    sync_log: Mutex<Vec<String>>,
    /// Every non-fleet control-plane call, as `operation:name`
    calls: Mutex<Vec<String>>,
}

impl MockFleet {
    pub fn new(apps: &[&str]) -> Self {
        Self {
            apps: apps.iter().map(|s| (*s).to_string()).collect(),
            health: HashMap::new(),
            state: Mutex::new(HashMap::new()),
            sync_log: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_health(mut self, app: &str, health: Health) -> Self {
        self.health.insert(app.to_string(), health);
        self
    }

    /// The first `n` sync requests for `app` are rejected
    #[must_use]
    pub fn with_failing_syncs(self, app: &str, n: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .entry(app.to_string())
            .or_default()
            .failing_syncs = n;
        self
    }

    pub fn sync_count(&self, app: &str) -> usize {
        self.state.lock().unwrap().get(app).map_or(0, |s| s.syncs)
    }

    /// Sync requests in issue order
    pub fn sync_log(&self) -> Vec<String> {
        self.sync_log.lock().unwrap().clone()
    }

    /// Time of the last sync request per app
    pub fn sync_times(&self) -> HashMap<String, Instant> {
        self.state
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(app, s)| s.last_sync.map(|t| (app.clone(), t)))
            .collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, name: &str) {
        self.calls.lock().unwrap().push(format!("{operation}:{name}"));
    }

    fn unavailable() -> ControlPlaneError {
        ControlPlaneError::Api {
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    fn known(&self, name: &str) -> Result<(), ControlPlaneError> {
        if self.apps.iter().any(|a| a == name) {
            Ok(())
        } else {
            Err(ControlPlaneError::Api {
                status: 404,
                body: format!("application '{name}' not found"),
            })
        }
    }
}

#[async_trait]
impl ApplicationFleet for MockFleet {
    async fn list_applications(&self) -> Result<Vec<AppSummary>, ControlPlaneError> {
        let mut out = Vec::new();
        for app in &self.apps {
            out.push(AppSummary {
                name: app.clone(),
                project: Some("default".to_string()),
                sync_status: "Synced".to_string(),
                health_status: "Healthy".to_string(),
                health_message: None,
            });
        }
        Ok(out)
    }

    async fn sync_application(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.known(name)?;
        self.sync_log.lock().unwrap().push(name.to_string());
        let mut state = self.state.lock().unwrap();
        let app = state.entry(name.to_string()).or_default();
        if app.failing_syncs > 0 {
            app.failing_syncs -= 1;
            return Err(ControlPlaneError::Api {
                status: 500,
                body: "sync rejected".to_string(),
            });
        }
        app.syncs += 1;
        app.last_sync = Some(Instant::now());
        Ok(json!({"metadata": {"name": name}}))
    }

    async fn application_status(&self, name: &str) -> Result<AppSummary, ControlPlaneError> {
        self.known(name)?;
        let health = self.health.get(name).copied().unwrap_or(Health::Healthy);
        let mut state = self.state.lock().unwrap();
        let app = state.entry(name.to_string()).or_default();
        app.polls += 1;

        let healthy = match health {
            Health::Healthy => true,
            Health::HealthyAfterSyncs(n) => app.syncs >= n,
            Health::HealthyAfterPolls(n) => app.polls >= n,
            Health::Never => false,
            Health::PollError => return Err(Self::unavailable()),
            Health::ErrorThenHealthy(n) if app.polls <= n => return Err(Self::unavailable()),
            Health::ErrorThenHealthy(_) => true,
        };

        Ok(AppSummary {
            name: name.to_string(),
            project: None,
            sync_status: "Synced".to_string(),
            health_status: if healthy { "Healthy" } else { "Degraded" }.to_string(),
            health_message: None,
        })
    }
}

#[async_trait]
impl ControlPlane for MockFleet {
    fn as_fleet(&self) -> &dyn ApplicationFleet {
        self
    }

    async fn get_application(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.known(name)?;
        self.record("get", name);
        Ok(json!({
            "metadata": {"name": name},
            "spec": {"project": "default", "destination": {"namespace": "apps"}},
            "status": {"sync": {"status": "Synced"}, "health": {"status": "Healthy"}}
        }))
    }

    async fn rollback_application(&self, name: &str, id: i64) -> Result<Value, ControlPlaneError> {
        self.known(name)?;
        self.record("rollback", &format!("{name}@{id}"));
        Ok(json!({"rolledBackTo": id}))
    }

    async fn application_logs(
        &self,
        name: &str,
        container: Option<&str>,
        tail_lines: u32,
    ) -> Result<String, ControlPlaneError> {
        self.known(name)?;
        self.record("logs", name);
        Ok(format!(
            "[00:00:00] {name}-pod: container={} tail={tail_lines}",
            container.unwrap_or("*")
        ))
    }

    async fn resource_tree(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.known(name)?;
        self.record("tree", name);
        Ok(json!({"nodes": [{"kind": "Deployment", "name": name}]}))
    }

    async fn managed_resources(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.known(name)?;
        self.record("managed", name);
        Ok(json!({"items": []}))
    }

    async fn application_events(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.known(name)?;
        self.record("events", name);
        Ok(json!({"items": []}))
    }

    async fn terminate_operation(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.known(name)?;
        self.record("terminate", name);
        Ok(json!({}))
    }

    async fn delete_application(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.known(name)?;
        self.record("delete", name);
        Ok(json!({}))
    }

    async fn restart_application(
        &self,
        name: &str,
        target: Option<&RestartTarget>,
    ) -> Result<Vec<RestartedResource>, ControlPlaneError> {
        self.known(name)?;
        self.record("restart", name);
        let resource = target.map_or_else(|| name.to_string(), |t| t.name.clone());
        Ok(vec![RestartedResource {
            kind: "Deployment".to_string(),
            name: resource,
            status: "restarted".to_string(),
        }])
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, ControlPlaneError> {
        Ok(vec![ProjectSummary {
            name: "default".to_string(),
            description: String::new(),
        }])
    }

    async fn get_project(&self, name: &str) -> Result<Value, ControlPlaneError> {
        self.record("project", name);
        Ok(json!({"metadata": {"name": name}}))
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterSummary>, ControlPlaneError> {
        Ok(vec![ClusterSummary {
            server: "https://kubernetes.default.svc".to_string(),
            name: "in-cluster".to_string(),
            status: Some("Successful".to_string()),
            server_version: Some("1.29".to_string()),
            applications_count: Some(self.apps.len() as u64),
        }])
    }

    async fn list_repositories(&self) -> Result<Vec<RepositorySummary>, ControlPlaneError> {
        Ok(vec![])
    }
}

// ============================================================================
// Mock source control
// ============================================================================

/// Records calls and answers with fixed data
#[derive(Default)]
pub struct MockSourceControl {
    pub default_owner: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockSourceControl {
    pub fn with_owner(owner: &str) -> Self {
        Self {
            default_owner: Some(owner.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn pull(number: u64, head: &str, base: &str) -> PullRequest {
        PullRequest {
            number,
            title: format!("PR {number}"),
            state: "open".to_string(),
            author: "octo".to_string(),
            base_branch: base.to_string(),
            head_branch: head.to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
            mergeable: Some(true),
            draft: false,
        }
    }

    fn run(id: u64, branch: &str) -> WorkflowRun {
        WorkflowRun {
            id,
            name: "CI".to_string(),
            status: "completed".to_string(),
            conclusion: Some("success".to_string()),
            branch: branch.to_string(),
            event: "push".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:01:00Z".to_string(),
            url: format!("https://github.com/acme/app/actions/runs/{id}"),
            actor: "octo".to_string(),
        }
    }
}

#[async_trait]
impl SourceControl for MockSourceControl {
    fn default_owner(&self) -> Option<&str> {
        self.default_owner.as_deref()
    }

    async fn search_repositories(
        &self,
        query: &str,
        owner: Option<&str>,
    ) -> Result<Vec<Repository>, SourceControlError> {
        self.record(format!("search:{query}:{}", owner.unwrap_or("-")));
        Ok(vec![Repository {
            name: query.to_string(),
            full_name: format!("{}/{query}", owner.unwrap_or("acme")),
            description: None,
            private: false,
            default_branch: "main".to_string(),
            url: format!("https://github.com/acme/{query}"),
            language: Some("Rust".to_string()),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }])
    }

    async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>, SourceControlError> {
        self.record(format!("branches:{owner}/{repo}"));
        Ok(vec![Branch {
            name: "main".to_string(),
            sha: "abc123".to_string(),
            protected: true,
        }])
    }

    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
    ) -> Result<Vec<PullRequest>, SourceControlError> {
        self.record(format!("pulls:{owner}/{repo}:{state}"));
        Ok(vec![Self::pull(1, "feature", "main")])
    }

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequestDetail, SourceControlError> {
        self.record(format!("pull:{owner}/{repo}#{number}"));
        Ok(PullRequestDetail {
            summary: Self::pull(number, "feature", "main"),
            body: None,
            additions: 1,
            deletions: 0,
            changed_files: 1,
            merged: false,
            merged_at: None,
            merged_by: None,
            reviewers: vec![],
            labels: vec![],
        })
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequest, SourceControlError> {
        self.record(format!("create:{owner}/{repo}:{}->{}", pr.head, pr.base));
        Ok(Self::pull(2, &pr.head, &pr.base))
    }

    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeResult, SourceControlError> {
        self.record(format!("merge:{owner}/{repo}#{number}:{method:?}"));
        Ok(MergeResult {
            merged: true,
            message: "Pull Request successfully merged".to_string(),
        })
    }

    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
    ) -> Result<Vec<WorkflowRun>, SourceControlError> {
        self.record(format!("runs:{owner}/{repo}:{}", branch.unwrap_or("-")));
        Ok(vec![Self::run(1, branch.unwrap_or("main"))])
    }

    async fn get_workflow_run(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> Result<WorkflowRun, SourceControlError> {
        self.record(format!("run:{owner}/{repo}#{run_id}"));
        Ok(Self::run(run_id, "main"))
    }
}
