//! Follow-up prompts offered after a tool result

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub label: &'static str,
    pub prompt: &'static str,
}

const VIEW_LOGS: Suggestion = Suggestion {
    label: "View logs",
    prompt: "Show the logs of this application",
};
const RESTART: Suggestion = Suggestion {
    label: "Restart",
    prompt: "Restart this application",
};
const HEALTH_PROBLEMS: Suggestion = Suggestion {
    label: "Health check",
    prompt: "Which applications have problems?",
};

const SYNC_APPLICATION: &[Suggestion] = &[
    VIEW_LOGS,
    Suggestion {
        label: "Check status",
        prompt: "What is the current status of this application?",
    },
];
const RESTART_APPLICATION: &[Suggestion] = &[
    Suggestion {
        label: "View logs",
        prompt: "Show the logs after the restart",
    },
    Suggestion {
        label: "Health check",
        prompt: "Is the application healthy?",
    },
];
const APPLICATION_LOGS: &[Suggestion] = &[
    RESTART,
    Suggestion {
        label: "View events",
        prompt: "Show the events of this application",
    },
];
const LIST_APPLICATIONS: &[Suggestion] = &[HEALTH_PROBLEMS];
const GET_APPLICATION: &[Suggestion] = &[
    Suggestion {
        label: "Sync",
        prompt: "Sync this application",
    },
    VIEW_LOGS,
];
const ROLLBACK_APPLICATION: &[Suggestion] = &[
    Suggestion {
        label: "Check status",
        prompt: "What is the status after the rollback?",
    },
    VIEW_LOGS,
];
const APPLICATION_EVENTS: &[Suggestion] = &[VIEW_LOGS, RESTART];
const RESOURCE_TREE: &[Suggestion] = &[
    Suggestion {
        label: "Restart component",
        prompt: "Restart one specific component",
    },
    VIEW_LOGS,
];
const DELETE_APPLICATION: &[Suggestion] = &[Suggestion {
    label: "List apps",
    prompt: "List all applications",
}];
const BATCH_SYNC: &[Suggestion] = &[
    Suggestion {
        label: "Show problems",
        prompt: "Which applications have problems?",
    },
    Suggestion {
        label: "Show logs",
        prompt: "Show the logs of the failing applications",
    },
    Suggestion {
        label: "List apps",
        prompt: "List all applications with their current status",
    },
];
const SEARCH_REPOSITORIES: &[Suggestion] = &[
    Suggestion {
        label: "View branches",
        prompt: "List the branches of this repository",
    },
    Suggestion {
        label: "View PRs",
        prompt: "List the open pull requests of this repository",
    },
];
const LIST_BRANCHES: &[Suggestion] = &[
    Suggestion {
        label: "Create PR",
        prompt: "Create a pull request from this branch",
    },
    Suggestion {
        label: "View workflows",
        prompt: "Show the workflow runs of this branch",
    },
];
const LIST_PULL_REQUESTS: &[Suggestion] = &[Suggestion {
    label: "PR details",
    prompt: "Show the details of the latest pull request",
}];
const GET_PULL_REQUEST: &[Suggestion] = &[
    Suggestion {
        label: "Merge",
        prompt: "Merge this pull request",
    },
    Suggestion {
        label: "View CI/CD",
        prompt: "Show the CI/CD status of this branch",
    },
];
const CREATE_PULL_REQUEST: &[Suggestion] = &[
    Suggestion {
        label: "View CI/CD",
        prompt: "Follow the CI/CD of the new pull request",
    },
    Suggestion {
        label: "Check conflicts",
        prompt: "Does the PR have merge conflicts?",
    },
];
const MERGE_PULL_REQUEST: &[Suggestion] = &[
    Suggestion {
        label: "Follow CI/CD",
        prompt: "Show the pipeline status after the merge",
    },
    Suggestion {
        label: "Sync ArgoCD",
        prompt: "Sync the application in ArgoCD to deploy it",
    },
];
const LIST_WORKFLOW_RUNS: &[Suggestion] = &[Suggestion {
    label: "Run details",
    prompt: "Show the details of the latest workflow run",
}];
const GET_WORKFLOW_RUN: &[Suggestion] = &[
    Suggestion {
        label: "View app logs",
        prompt: "Show the application logs in ArgoCD",
    },
    Suggestion {
        label: "Sync ArgoCD",
        prompt: "Sync the application in ArgoCD",
    },
];

/// Static suggestions for `tool_name`; empty when there are none
pub fn suggestions_for(tool_name: &str) -> &'static [Suggestion] {
    match tool_name {
        "sync_application" => SYNC_APPLICATION,
        "restart_application" => RESTART_APPLICATION,
        "get_application_logs" => APPLICATION_LOGS,
        "list_applications" => LIST_APPLICATIONS,
        "get_application" => GET_APPLICATION,
        "rollback_application" => ROLLBACK_APPLICATION,
        "get_application_events" => APPLICATION_EVENTS,
        "get_resource_tree" => RESOURCE_TREE,
        "delete_application" => DELETE_APPLICATION,
        "batch_sync" => BATCH_SYNC,
        "search_repositories" => SEARCH_REPOSITORIES,
        "list_branches" => LIST_BRANCHES,
        "list_pull_requests" => LIST_PULL_REQUESTS,
        "get_pull_request" => GET_PULL_REQUEST,
        "create_pull_request" => CREATE_PULL_REQUEST,
        "merge_pull_request" => MERGE_PULL_REQUEST,
        "list_workflow_runs" => LIST_WORKFLOW_RUNS,
        "get_workflow_run" => GET_WORKFLOW_RUN,
        _ => &[],
    }
}
