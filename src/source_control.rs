//! Source-control collaborator (GitHub)

mod github;

pub use github::GitHubClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_GITHUB_URL: &str = "https://api.github.com";

#[derive(Debug, Error)]
pub enum SourceControlError {
    #[error("GitHub API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("GitHub request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("No repository owner given and no default owner configured")]
    MissingOwner,
}

#[derive(Debug, Clone)]
pub struct GitServerConfig {
    pub url: String,
    pub token: String,
    /// Organization or user used when a tool call names none
    pub default_owner: Option<String>,
}

impl GitServerConfig {
    /// Reads `GITHUB_*`. `None` when no token is set.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("GITHUB_TOKEN").ok()?;
        Some(Self {
            url: std::env::var("GITHUB_URL").unwrap_or_else(|_| DEFAULT_GITHUB_URL.to_string()),
            token,
            default_owner: std::env::var("GITHUB_OWNER").ok(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub private: bool,
    pub default_branch: String,
    pub url: String,
    pub language: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
    pub sha: String,
    pub protected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author: String,
    pub base_branch: String,
    pub head_branch: String,
    pub created_at: String,
    pub updated_at: String,
    pub mergeable: Option<bool>,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestDetail {
    #[serde(flatten)]
    pub summary: PullRequest,
    pub body: Option<String>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub merged: bool,
    pub merged_at: Option<String>,
    pub merged_by: Option<String>,
    pub reviewers: Vec<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "merge" => Some(Self::Merge),
            "squash" => Some(Self::Squash),
            "rebase" => Some(Self::Rebase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    pub merged: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub branch: String,
    pub event: String,
    pub created_at: String,
    pub updated_at: String,
    pub url: String,
    pub actor: String,
}

#[async_trait]
pub trait SourceControl: Send + Sync {
    fn default_owner(&self) -> Option<&str>;

    async fn search_repositories(
        &self,
        query: &str,
        owner: Option<&str>,
    ) -> Result<Vec<Repository>, SourceControlError>;

    async fn list_branches(&self, owner: &str, repo: &str)
        -> Result<Vec<Branch>, SourceControlError>;

    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
    ) -> Result<Vec<PullRequest>, SourceControlError>;

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequestDetail, SourceControlError>;

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequest, SourceControlError>;

    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeResult, SourceControlError>;

    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
    ) -> Result<Vec<WorkflowRun>, SourceControlError>;

    async fn get_workflow_run(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> Result<WorkflowRun, SourceControlError>;
}
