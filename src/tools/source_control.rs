//! GitHub tools
//!
//! Every tool that addresses a repository accepts an optional `owner`; when
//! it is missing the configured default owner is used.

use super::args::{self, non_empty};
use super::{Tool, ToolContext, ToolError, ToolOutput};
use crate::llm::{ParamSpec, ToolParameters};
use crate::source_control::{MergeMethod, NewPullRequest, SourceControl, SourceControlError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

fn resolve_owner(given: Option<String>, git: &dyn SourceControl) -> Result<String, ToolError> {
    non_empty(given)
        .or_else(|| git.default_owner().map(str::to_string))
        .ok_or(ToolError::SourceControl(SourceControlError::MissingOwner))
}

fn owner_param(params: ToolParameters) -> ToolParameters {
    params.optional(
        "owner",
        ParamSpec::string("Repository owner (organization or user). Defaults to the configured owner"),
    )
}

fn repo_params() -> ToolParameters {
    owner_param(ToolParameters::new().required("repo", ParamSpec::string("Repository name")))
}

#[derive(Debug, Deserialize)]
struct RepoInput {
    #[serde(default)]
    owner: Option<String>,
    repo: String,
}

pub struct SearchRepositoriesTool;

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default)]
    owner: Option<String>,
}

#[async_trait]
impl Tool for SearchRepositoriesTool {
    fn name(&self) -> &'static str {
        "search_repositories"
    }

    fn description(&self) -> String {
        "Search GitHub repositories by name or keyword".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        owner_param(ToolParameters::new().required("query", ParamSpec::string("Search terms")))
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: SearchInput = args::parse(input)?;
        let git = ctx.source_control()?;
        let owner = non_empty(input.owner).or_else(|| git.default_owner().map(str::to_string));
        ToolOutput::json(git.search_repositories(&input.query, owner.as_deref()).await?)
    }
}

pub struct ListBranchesTool;

#[async_trait]
impl Tool for ListBranchesTool {
    fn name(&self) -> &'static str {
        "list_branches"
    }

    fn description(&self) -> String {
        "List the branches of a GitHub repository".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        repo_params()
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: RepoInput = args::parse(input)?;
        let git = ctx.source_control()?;
        let owner = resolve_owner(input.owner, git)?;
        ToolOutput::json(git.list_branches(&owner, &input.repo).await?)
    }
}

pub struct ListPullRequestsTool;

#[derive(Debug, Deserialize)]
struct ListPullsInput {
    #[serde(default)]
    owner: Option<String>,
    repo: String,
    #[serde(default)]
    state: Option<String>,
}

#[async_trait]
impl Tool for ListPullRequestsTool {
    fn name(&self) -> &'static str {
        "list_pull_requests"
    }

    fn description(&self) -> String {
        "List pull requests of a GitHub repository".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        repo_params().optional(
            "state",
            ParamSpec::one_of("Filter by state (default open)", &["open", "closed", "all"]),
        )
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: ListPullsInput = args::parse(input)?;
        let git = ctx.source_control()?;
        let owner = resolve_owner(input.owner, git)?;
        let state = non_empty(input.state).unwrap_or_else(|| "open".to_string());
        ToolOutput::json(git.list_pull_requests(&owner, &input.repo, &state).await?)
    }
}

pub struct GetPullRequestTool;

#[derive(Debug, Deserialize)]
struct PullInput {
    #[serde(default)]
    owner: Option<String>,
    repo: String,
    #[serde(deserialize_with = "args::id")]
    number: u64,
}

#[async_trait]
impl Tool for GetPullRequestTool {
    fn name(&self) -> &'static str {
        "get_pull_request"
    }

    fn description(&self) -> String {
        "Get the details of a pull request: description, changes, reviewers, labels and merge state"
            .to_string()
    }

    fn parameters(&self) -> ToolParameters {
        repo_params().required("number", ParamSpec::number("Pull request number"))
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: PullInput = args::parse(input)?;
        let git = ctx.source_control()?;
        let owner = resolve_owner(input.owner, git)?;
        ToolOutput::json(
            git.get_pull_request(&owner, &input.repo, input.number)
                .await?,
        )
    }
}

pub struct CreatePullRequestTool;

#[derive(Debug, Deserialize)]
struct CreatePullInput {
    #[serde(default)]
    owner: Option<String>,
    repo: String,
    title: String,
    head: String,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

#[async_trait]
impl Tool for CreatePullRequestTool {
    fn name(&self) -> &'static str {
        "create_pull_request"
    }

    fn description(&self) -> String {
        "Open a new pull request from a head branch into a base branch".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        repo_params()
            .required("title", ParamSpec::string("Pull request title"))
            .required("head", ParamSpec::string("Branch with the changes"))
            .optional("base", ParamSpec::string("Target branch (default main)"))
            .optional("body", ParamSpec::string("Pull request description"))
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: CreatePullInput = args::parse(input)?;
        let git = ctx.source_control()?;
        let owner = resolve_owner(input.owner, git)?;
        let pr = NewPullRequest {
            title: input.title,
            head: input.head,
            base: non_empty(input.base).unwrap_or_else(|| "main".to_string()),
            body: input.body.unwrap_or_default(),
        };
        ToolOutput::json(git.create_pull_request(&owner, &input.repo, &pr).await?)
    }
}

pub struct MergePullRequestTool;

#[derive(Debug, Deserialize)]
struct MergeInput {
    #[serde(default)]
    owner: Option<String>,
    repo: String,
    #[serde(deserialize_with = "args::id")]
    number: u64,
    #[serde(default)]
    merge_method: Option<String>,
}

#[async_trait]
impl Tool for MergePullRequestTool {
    fn name(&self) -> &'static str {
        "merge_pull_request"
    }

    fn description(&self) -> String {
        "Merge a pull request. Check that it is mergeable with get_pull_request first.".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        repo_params()
            .required("number", ParamSpec::number("Pull request number"))
            .optional(
                "merge_method",
                ParamSpec::one_of("Merge method (default merge)", &["merge", "squash", "rebase"]),
            )
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: MergeInput = args::parse(input)?;
        let method = match non_empty(input.merge_method) {
            None => MergeMethod::default(),
            Some(m) => MergeMethod::parse(&m)
                .ok_or_else(|| ToolError::InvalidArguments(format!("unknown merge method '{m}'")))?,
        };
        let git = ctx.source_control()?;
        let owner = resolve_owner(input.owner, git)?;
        ToolOutput::json(
            git.merge_pull_request(&owner, &input.repo, input.number, method)
                .await?,
        )
    }
}

pub struct ListWorkflowRunsTool;

#[derive(Debug, Deserialize)]
struct RunsInput {
    #[serde(default)]
    owner: Option<String>,
    repo: String,
    #[serde(default)]
    branch: Option<String>,
}

#[async_trait]
impl Tool for ListWorkflowRunsTool {
    fn name(&self) -> &'static str {
        "list_workflow_runs"
    }

    fn description(&self) -> String {
        "List recent GitHub Actions workflow runs of a repository".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        repo_params().optional("branch", ParamSpec::string("Only runs for this branch"))
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: RunsInput = args::parse(input)?;
        let git = ctx.source_control()?;
        let owner = resolve_owner(input.owner, git)?;
        let branch = non_empty(input.branch);
        ToolOutput::json(
            git.list_workflow_runs(&owner, &input.repo, branch.as_deref())
                .await?,
        )
    }
}

pub struct GetWorkflowRunTool;

#[derive(Debug, Deserialize)]
struct RunInput {
    #[serde(default)]
    owner: Option<String>,
    repo: String,
    #[serde(deserialize_with = "args::id")]
    run_id: u64,
}

#[async_trait]
impl Tool for GetWorkflowRunTool {
    fn name(&self) -> &'static str {
        "get_workflow_run"
    }

    fn description(&self) -> String {
        "Get the status and conclusion of a single GitHub Actions workflow run".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        repo_params().required("run_id", ParamSpec::number("Workflow run id"))
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: RunInput = args::parse(input)?;
        let git = ctx.source_control()?;
        let owner = resolve_owner(input.owner, git)?;
        ToolOutput::json(
            git.get_workflow_run(&owner, &input.repo, input.run_id)
                .await?,
        )
    }
}
