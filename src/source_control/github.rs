//! GitHub REST client

use super::{
    Branch, MergeMethod, MergeResult, NewPullRequest, PullRequest, PullRequestDetail,
    Repository, SourceControl, SourceControlError, WorkflowRun, GitServerConfig,
};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const API_VERSION: &str = "2022-11-28";
const MAX_ERROR_BODY_CHARS: usize = 300;

pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    default_owner: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GitServerConfig) -> Result<Self, SourceControlError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("argonaut/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            default_owner: config.default_owner.clone(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T, SourceControlError> {
        let mut request = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceControlError::Api {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        Ok(response.json().await?)
    }
}

// GitHub wire types, trimmed to the fields we surface

#[derive(Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Deserialize)]
struct GhRepo {
    name: String,
    full_name: String,
    description: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    default_branch: String,
    html_url: String,
    language: Option<String>,
    #[serde(default)]
    updated_at: String,
}

#[derive(Deserialize)]
struct GhSearch<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct GhCommitRef {
    sha: String,
}

#[derive(Deserialize)]
struct GhBranch {
    name: String,
    commit: GhCommitRef,
    #[serde(default)]
    protected: bool,
}

#[derive(Deserialize)]
struct GhRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Deserialize)]
struct GhPull {
    number: u64,
    title: String,
    state: String,
    user: GhUser,
    base: GhRef,
    head: GhRef,
    created_at: String,
    updated_at: String,
    mergeable: Option<bool>,
    #[serde(default)]
    draft: bool,
    body: Option<String>,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changed_files: u64,
    #[serde(default)]
    merged: bool,
    merged_at: Option<String>,
    merged_by: Option<GhUser>,
    #[serde(default)]
    requested_reviewers: Vec<GhUser>,
    #[serde(default)]
    labels: Vec<GhLabel>,
}

#[derive(Deserialize)]
struct GhMerge {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct GhRuns {
    workflow_runs: Vec<GhRun>,
}

#[derive(Deserialize)]
struct GhRun {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
    head_branch: Option<String>,
    event: String,
    created_at: String,
    updated_at: String,
    html_url: String,
    actor: Option<GhUser>,
}

impl From<GhRepo> for Repository {
    fn from(r: GhRepo) -> Self {
        Self {
            name: r.name,
            full_name: r.full_name,
            description: r.description.filter(|d| !d.is_empty()),
            private: r.private,
            default_branch: r.default_branch,
            url: r.html_url,
            language: r.language,
            updated_at: r.updated_at,
        }
    }
}

impl GhPull {
    fn summary(&self) -> PullRequest {
        PullRequest {
            number: self.number,
            title: self.title.clone(),
            state: self.state.clone(),
            author: self.user.login.clone(),
            base_branch: self.base.name.clone(),
            head_branch: self.head.name.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            mergeable: self.mergeable,
            draft: self.draft,
        }
    }

    fn detail(self) -> PullRequestDetail {
        PullRequestDetail {
            summary: self.summary(),
            body: self.body.filter(|b| !b.is_empty()),
            additions: self.additions,
            deletions: self.deletions,
            changed_files: self.changed_files,
            merged: self.merged,
            merged_at: self.merged_at,
            merged_by: self.merged_by.map(|u| u.login),
            reviewers: self.requested_reviewers.into_iter().map(|u| u.login).collect(),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

impl From<GhRun> for WorkflowRun {
    fn from(r: GhRun) -> Self {
        Self {
            id: r.id,
            name: r.name.unwrap_or_default(),
            status: r.status.unwrap_or_default(),
            conclusion: r.conclusion,
            branch: r.head_branch.unwrap_or_default(),
            event: r.event,
            created_at: r.created_at,
            updated_at: r.updated_at,
            url: r.html_url,
            actor: r.actor.map(|a| a.login).unwrap_or_default(),
        }
    }
}

/// Search query scoped to an organization when one is known
fn scoped_query(query: &str, owner: Option<&str>) -> String {
    match owner {
        Some(owner) => format!("{query} org:{owner}"),
        None => query.to_string(),
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    fn default_owner(&self) -> Option<&str> {
        self.default_owner.as_deref()
    }

    async fn search_repositories(
        &self,
        query: &str,
        owner: Option<&str>,
    ) -> Result<Vec<Repository>, SourceControlError> {
        let q = scoped_query(query, owner.or(self.default_owner.as_deref()));
        let data: GhSearch<GhRepo> = self
            .request(
                Method::GET,
                "/search/repositories",
                &[
                    ("q", q),
                    ("per_page", "20".to_string()),
                    ("sort", "updated".to_string()),
                ],
                None,
            )
            .await?;
        Ok(data.items.into_iter().map(Repository::from).collect())
    }

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Branch>, SourceControlError> {
        let data: Vec<GhBranch> = self
            .request(
                Method::GET,
                &format!("/repos/{owner}/{repo}/branches"),
                &[("per_page", "100".to_string())],
                None,
            )
            .await?;
        Ok(data
            .into_iter()
            .map(|b| Branch {
                name: b.name,
                sha: b.commit.sha,
                protected: b.protected,
            })
            .collect())
    }

    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
    ) -> Result<Vec<PullRequest>, SourceControlError> {
        let data: Vec<GhPull> = self
            .request(
                Method::GET,
                &format!("/repos/{owner}/{repo}/pulls"),
                &[
                    ("state", state.to_string()),
                    ("per_page", "30".to_string()),
                    ("sort", "updated".to_string()),
                    ("direction", "desc".to_string()),
                ],
                None,
            )
            .await?;
        Ok(data.iter().map(GhPull::summary).collect())
    }

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequestDetail, SourceControlError> {
        let pr: GhPull = self
            .request(
                Method::GET,
                &format!("/repos/{owner}/{repo}/pulls/{number}"),
                &[],
                None,
            )
            .await?;
        Ok(pr.detail())
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequest, SourceControlError> {
        let created: GhPull = self
            .request(
                Method::POST,
                &format!("/repos/{owner}/{repo}/pulls"),
                &[],
                Some(json!(pr)),
            )
            .await?;
        tracing::info!(owner, repo, number = created.number, "Created pull request");
        Ok(created.summary())
    }

    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeResult, SourceControlError> {
        let data: GhMerge = self
            .request(
                Method::PUT,
                &format!("/repos/{owner}/{repo}/pulls/{number}/merge"),
                &[],
                Some(json!({ "merge_method": method })),
            )
            .await?;
        tracing::info!(owner, repo, number, merged = data.merged, "Merged pull request");
        Ok(MergeResult {
            merged: data.merged,
            message: data.message,
        })
    }

    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
    ) -> Result<Vec<WorkflowRun>, SourceControlError> {
        let mut query = vec![("per_page", "20".to_string())];
        if let Some(branch) = branch {
            query.push(("branch", branch.to_string()));
        }
        let data: GhRuns = self
            .request(
                Method::GET,
                &format!("/repos/{owner}/{repo}/actions/runs"),
                &query,
                None,
            )
            .await?;
        Ok(data.workflow_runs.into_iter().map(WorkflowRun::from).collect())
    }

    async fn get_workflow_run(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> Result<WorkflowRun, SourceControlError> {
        let run: GhRun = self
            .request(
                Method::GET,
                &format!("/repos/{owner}/{repo}/actions/runs/{run_id}"),
                &[],
                None,
            )
            .await?;
        Ok(run.into())
    }
}
