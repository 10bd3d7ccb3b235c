//! Progress snapshots and the final summary

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Resolving,
    BatchStart,
    Syncing,
    Polling,
    BatchComplete,
    Retrying,
    BatchFailed,
    Complete,
    Aborted,
}

impl Phase {
    #[cfg(test)]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub sync_status: String,
    pub health_status: String,
}

impl AppStatus {
    pub fn new(sync_status: impl Into<String>, health_status: impl Into<String>) -> Self {
        Self {
            sync_status: sync_status.into(),
            health_status: health_status.into(),
        }
    }

    /// Sync request was rejected
    pub fn sync_error() -> Self {
        Self::new("SyncError", "Unknown")
    }

    /// Status could not be read
    pub fn unknown() -> Self {
        Self::new("Unknown", "Unknown")
    }

    pub fn is_healthy(&self) -> bool {
        self.health_status == "Healthy"
    }
}

/// Complete point-in-time orchestrator state. Each snapshot is an owned
/// value; nothing the receiver does can affect the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncProgress {
    pub phase: Phase,
    pub total_apps: usize,
    pub total_batches: usize,
    /// 1-based; 0 before the first batch starts
    pub current_batch: usize,
    pub batch_apps: Vec<String>,
    /// Covers only the apps of the current batch
    pub app_statuses: BTreeMap<String, AppStatus>,
    /// 1-based attempt within the current batch
    pub attempt: u32,
    pub max_retries: u32,
    pub message: String,
}

/// Receives every snapshot as it is produced
pub type ProgressSink = Arc<dyn Fn(BatchSyncProgress) + Send + Sync>;

/// Terminal result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncSummary {
    pub success: bool,
    pub matched_apps: Vec<String>,
    pub completed_apps: Vec<String>,
    pub failed_apps: Vec<String>,
    pub skipped_apps: Vec<String>,
    pub total_apps: usize,
    pub completed_batches: usize,
    pub total_batches: usize,
    pub message: String,
}
