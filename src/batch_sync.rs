//! Batched deployment orchestrator
//!
//! Syncs a set of applications in fixed-size batches. Apps inside a batch are
//! synced concurrently; a batch must become healthy before the next starts.
//! Each batch gets `max_attempts` tries, each try bounded by a soft health
//! deadline. Every state change is published as a [`BatchSyncProgress`].

mod pattern;
mod progress;

pub use pattern::AppPattern;
pub use progress::{AppStatus, BatchSyncProgress, BatchSyncSummary, Phase, ProgressSink};

use crate::control_plane::{AppSummary, ControlPlaneError};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(300);
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// The part of the control plane the orchestrator drives
#[async_trait]
pub trait ApplicationFleet: Send + Sync {
    async fn list_applications(&self) -> Result<Vec<AppSummary>, ControlPlaneError>;

    async fn sync_application(&self, name: &str) -> Result<Value, ControlPlaneError>;

    async fn application_status(&self, name: &str) -> Result<AppSummary, ControlPlaneError>;
}

#[derive(Debug, Error)]
pub enum BatchSyncError {
    #[error("batch_size must be at least 1")]
    InvalidBatchSize,

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("No applications given")]
    EmptyAppList,

    #[error("Applications not found: {}", .0.join(", "))]
    UnknownApps(Vec<String>),

    #[error("Failed to list applications: {0}")]
    ControlPlane(#[from] ControlPlaneError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    /// Glob over all application names; matches run in sorted order
    Pattern(String),
    /// Exact names, run in the given order
    Apps(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct BatchSyncOptions {
    pub target: SyncTarget,
    pub batch_size: usize,
    /// Total tries per batch, including the first
    pub max_attempts: u32,
    pub health_timeout: Duration,
    pub poll_interval: Duration,
}

impl BatchSyncOptions {
    pub fn new(target: SyncTarget) -> Self {
        Self {
            target,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Consecutive groups of `batch_size`; only the last may be shorter
pub fn partition(apps: &[String], batch_size: usize) -> Vec<Vec<String>> {
    if batch_size == 0 {
        return Vec::new();
    }
    apps.chunks(batch_size).map(<[String]>::to_vec).collect()
}

enum BatchOutcome {
    Healthy,
    Unhealthy(Vec<String>),
    Cancelled,
}

/// Run a batched sync to completion.
///
/// Validation problems fail before any sync is issued. Once batches start,
/// the run always ends with a summary, even when a batch fails or the run is
/// cancelled.
pub async fn run_batch_sync(
    fleet: &dyn ApplicationFleet,
    options: &BatchSyncOptions,
    progress: &(dyn Fn(BatchSyncProgress) + Send + Sync),
    cancel: &CancellationToken,
) -> Result<BatchSyncSummary, BatchSyncError> {
    if options.batch_size == 0 {
        return Err(BatchSyncError::InvalidBatchSize);
    }
    let max_attempts = options.max_attempts.max(1);

    let mut run = Run {
        fleet,
        options,
        progress,
        cancel,
        max_attempts,
        total_apps: 0,
        total_batches: 0,
    };

    run.emit(
        Phase::Resolving,
        0,
        &[],
        &BTreeMap::new(),
        0,
        "Resolving target applications".to_string(),
    );

    let listed = fleet.list_applications().await?;
    let targets = resolve_targets(&options.target, &listed)?;

    if targets.is_empty() {
        let message = match &options.target {
            SyncTarget::Pattern(p) => format!("No applications match pattern '{p}'"),
            SyncTarget::Apps(_) => "No applications to sync".to_string(),
        };
        run.emit(Phase::Aborted, 0, &[], &BTreeMap::new(), 0, message.clone());
        return Ok(BatchSyncSummary {
            success: false,
            matched_apps: Vec::new(),
            completed_apps: Vec::new(),
            failed_apps: Vec::new(),
            skipped_apps: Vec::new(),
            total_apps: 0,
            completed_batches: 0,
            total_batches: 0,
            message,
        });
    }

    let batches = partition(&targets, options.batch_size);
    run.total_apps = targets.len();
    run.total_batches = batches.len();

    tracing::info!(
        apps = targets.len(),
        batches = batches.len(),
        batch_size = options.batch_size,
        max_attempts,
        "Starting batch sync"
    );

    let mut completed: Vec<String> = Vec::new();

    for (index, batch) in batches.iter().enumerate() {
        let batch_no = index + 1;
        run.emit(
            Phase::BatchStart,
            batch_no,
            batch,
            &BTreeMap::new(),
            1,
            format!(
                "Starting batch {batch_no}/{}: {}",
                batches.len(),
                batch.join(", ")
            ),
        );

        match run.run_batch(batch_no, batch).await {
            BatchOutcome::Healthy => {
                completed.extend(batch.iter().cloned());
                run.emit(
                    Phase::BatchComplete,
                    batch_no,
                    batch,
                    &healthy_statuses(batch),
                    0,
                    format!("Batch {batch_no}/{} is healthy", batches.len()),
                );
            }
            BatchOutcome::Unhealthy(failed) => {
                let skipped: Vec<String> = batches[index + 1..].concat();
                run.emit(
                    Phase::BatchFailed,
                    batch_no,
                    batch,
                    &BTreeMap::new(),
                    max_attempts,
                    format!(
                        "Batch {batch_no} failed after {max_attempts} attempt(s). Unhealthy: {}",
                        failed.join(", ")
                    ),
                );
                let message = format!(
                    "Batch sync stopped at batch {batch_no}/{}: {} completed, {} failed, {} skipped",
                    batches.len(),
                    completed.len(),
                    failed.len(),
                    skipped.len()
                );
                run.emit(Phase::Aborted, batch_no, batch, &BTreeMap::new(), 0, message.clone());
                tracing::warn!(batch = batch_no, failed = ?failed, "Batch sync aborted");
                return Ok(BatchSyncSummary {
                    success: false,
                    matched_apps: targets.clone(),
                    completed_apps: completed,
                    failed_apps: failed,
                    skipped_apps: skipped,
                    total_apps: targets.len(),
                    completed_batches: index,
                    total_batches: batches.len(),
                    message,
                });
            }
            BatchOutcome::Cancelled => {
                let skipped: Vec<String> = batches[index..].concat();
                let message = "Batch sync cancelled".to_string();
                run.emit(Phase::Aborted, batch_no, batch, &BTreeMap::new(), 0, message.clone());
                tracing::info!(batch = batch_no, "Batch sync cancelled");
                return Ok(BatchSyncSummary {
                    success: false,
                    matched_apps: targets.clone(),
                    completed_apps: completed,
                    failed_apps: Vec::new(),
                    skipped_apps: skipped,
                    total_apps: targets.len(),
                    completed_batches: index,
                    total_batches: batches.len(),
                    message,
                });
            }
        }
    }

    let message = format!(
        "All {} application(s) synced and healthy across {} batch(es)",
        completed.len(),
        batches.len()
    );
    run.emit(Phase::Complete, batches.len(), &[], &BTreeMap::new(), 0, message.clone());
    tracing::info!(apps = completed.len(), "Batch sync complete");

    Ok(BatchSyncSummary {
        success: true,
        matched_apps: targets.clone(),
        completed_apps: completed,
        failed_apps: Vec::new(),
        skipped_apps: Vec::new(),
        total_apps: targets.len(),
        completed_batches: batches.len(),
        total_batches: batches.len(),
        message,
    })
}

fn resolve_targets(
    target: &SyncTarget,
    listed: &[AppSummary],
) -> Result<Vec<String>, BatchSyncError> {
    match target {
        SyncTarget::Pattern(raw) => {
            let pattern = AppPattern::new(raw)?;
            Ok(pattern.select(listed.iter().map(|a| a.name.as_str())))
        }
        SyncTarget::Apps(names) => {
            if names.is_empty() {
                return Err(BatchSyncError::EmptyAppList);
            }
            let known: HashSet<&str> = listed.iter().map(|a| a.name.as_str()).collect();
            let unknown: Vec<String> = names
                .iter()
                .filter(|n| !known.contains(n.as_str()))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(BatchSyncError::UnknownApps(unknown));
            }
            // Keep caller order, drop repeats
            let mut seen = HashSet::new();
            Ok(names
                .iter()
                .filter(|n| seen.insert(n.as_str()))
                .cloned()
                .collect())
        }
    }
}

fn healthy_statuses(batch: &[String]) -> BTreeMap<String, AppStatus> {
    batch
        .iter()
        .map(|app| (app.clone(), AppStatus::new("Synced", "Healthy")))
        .collect()
}

struct Run<'a> {
    fleet: &'a dyn ApplicationFleet,
    options: &'a BatchSyncOptions,
    progress: &'a (dyn Fn(BatchSyncProgress) + Send + Sync),
    cancel: &'a CancellationToken,
    max_attempts: u32,
    total_apps: usize,
    total_batches: usize,
}

impl Run<'_> {
    fn emit(
        &self,
        phase: Phase,
        current_batch: usize,
        batch_apps: &[String],
        statuses: &BTreeMap<String, AppStatus>,
        attempt: u32,
        message: String,
    ) {
        tracing::debug!(phase = ?phase, batch = current_batch, attempt, "{message}");
        (self.progress)(BatchSyncProgress {
            phase,
            total_apps: self.total_apps,
            total_batches: self.total_batches,
            current_batch,
            batch_apps: batch_apps.to_vec(),
            app_statuses: statuses.clone(),
            attempt,
            max_retries: self.max_attempts - 1,
            message,
        });
    }

    async fn run_batch(&self, batch_no: usize, batch: &[String]) -> BatchOutcome {
        for attempt in 1..=self.max_attempts {
            if self.cancel.is_cancelled() {
                return BatchOutcome::Cancelled;
            }

            self.emit(
                Phase::Syncing,
                batch_no,
                batch,
                &BTreeMap::new(),
                attempt,
                format!(
                    "Syncing batch {batch_no} (attempt {attempt}/{})",
                    self.max_attempts
                ),
            );

            let syncs = join_all(batch.iter().map(|app| self.fleet.sync_application(app)));
            let outcomes = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return BatchOutcome::Cancelled,
                outcomes = syncs => outcomes,
            };

            // A rejected sync only seeds the status; the app is still polled
            let mut statuses = BTreeMap::new();
            for (app, outcome) in batch.iter().zip(outcomes) {
                let initial = match outcome {
                    Ok(_) => AppStatus::new("Syncing", "Unknown"),
                    Err(e) => {
                        tracing::warn!(app = %app, attempt, error = %e, "Sync request failed");
                        AppStatus::sync_error()
                    }
                };
                statuses.insert(app.clone(), initial);
            }

            let deadline = Instant::now() + self.options.health_timeout;
            loop {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return BatchOutcome::Cancelled,
                    () = tokio::time::sleep(self.options.poll_interval) => {}
                }

                let reads = join_all(batch.iter().map(|app| self.fleet.application_status(app)))
                    .await;
                for (app, read) in batch.iter().zip(reads) {
                    let status = match read {
                        Ok(summary) => AppStatus::new(summary.sync_status, summary.health_status),
                        Err(e) => {
                            tracing::debug!(app = %app, error = %e, "Status read failed");
                            AppStatus::unknown()
                        }
                    };
                    statuses.insert(app.clone(), status);
                }

                let healthy = statuses.values().filter(|s| s.is_healthy()).count();
                self.emit(
                    Phase::Polling,
                    batch_no,
                    batch,
                    &statuses,
                    attempt,
                    format!(
                        "Batch {batch_no}: {healthy}/{} healthy (attempt {attempt}/{})",
                        batch.len(),
                        self.max_attempts
                    ),
                );

                if healthy == batch.len() {
                    return BatchOutcome::Healthy;
                }
                if Instant::now() >= deadline {
                    break;
                }
            }

            let unhealthy: Vec<String> = batch
                .iter()
                .filter(|app| !statuses.get(*app).is_some_and(AppStatus::is_healthy))
                .cloned()
                .collect();

            if attempt == self.max_attempts {
                return BatchOutcome::Unhealthy(unhealthy);
            }

            self.emit(
                Phase::Retrying,
                batch_no,
                batch,
                &statuses,
                attempt,
                format!(
                    "Batch {batch_no} not healthy after attempt {attempt}/{} ({}), retrying",
                    self.max_attempts,
                    unhealthy.join(", ")
                ),
            );
        }

        // max_attempts >= 1, so the loop always returns
        BatchOutcome::Unhealthy(batch.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Health, MockFleet};
    use std::sync::{Arc, Mutex};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn recorder() -> (Arc<Mutex<Vec<BatchSyncProgress>>>, ProgressSink) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: ProgressSink = Arc::new(move |p| sink_seen.lock().unwrap().push(p));
        (seen, sink)
    }

    async fn run(
        fleet: &MockFleet,
        options: BatchSyncOptions,
    ) -> (
        Result<BatchSyncSummary, BatchSyncError>,
        Vec<BatchSyncProgress>,
    ) {
        let (seen, sink) = recorder();
        let result = run_batch_sync(fleet, &options, &*sink, &CancellationToken::new()).await;
        let snapshots = seen.lock().unwrap().clone();
        (result, snapshots)
    }

    fn phases(snapshots: &[BatchSyncProgress]) -> Vec<Phase> {
        snapshots.iter().map(|s| s.phase).collect()
    }

    #[test]
    fn test_partition_preserves_order() {
        let apps = names(&["a", "b", "c", "d", "e"]);
        assert_eq!(
            partition(&apps, 2),
            vec![names(&["a", "b"]), names(&["c", "d"]), names(&["e"])]
        );
        assert_eq!(partition(&apps, 5), vec![apps.clone()]);
        assert!(partition(&apps, 0).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_healthy_first_attempt() {
        let fleet = MockFleet::new(&["svc-a", "svc-b", "svc-c", "other"]);
        let mut options = BatchSyncOptions::new(SyncTarget::Pattern("svc-*".to_string()));
        options.batch_size = 2;

        let (result, snapshots) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(summary.success);
        assert_eq!(summary.matched_apps, names(&["svc-a", "svc-b", "svc-c"]));
        assert_eq!(summary.completed_apps, summary.matched_apps);
        assert_eq!(summary.completed_batches, summary.total_batches);
        assert_eq!(summary.total_batches, 2);
        assert!(summary.failed_apps.is_empty());
        assert_eq!(fleet.sync_count("other"), 0);
        assert_eq!(
            phases(&snapshots),
            vec![
                Phase::Resolving,
                Phase::BatchStart,
                Phase::Syncing,
                Phase::Polling,
                Phase::BatchComplete,
                Phase::BatchStart,
                Phase::Syncing,
                Phase::Polling,
                Phase::BatchComplete,
                Phase::Complete,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pattern_without_matches() {
        let fleet = MockFleet::new(&["svc-a"]);
        let options = BatchSyncOptions::new(SyncTarget::Pattern("web-*".to_string()));

        let (result, snapshots) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(!summary.success);
        assert!(summary.matched_apps.is_empty());
        assert!(summary.completed_apps.is_empty());
        assert_eq!(summary.total_batches, 0);
        assert_eq!(snapshots.last().unwrap().phase, Phase::Aborted);
        assert!(fleet.sync_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_apps_rejected_before_sync() {
        let fleet = MockFleet::new(&["svc-a", "svc-b"]);
        let options = BatchSyncOptions::new(SyncTarget::Apps(names(&["svc-a", "ghost"])));

        let (result, _) = run(&fleet, options).await;

        match result {
            Err(BatchSyncError::UnknownApps(unknown)) => assert_eq!(unknown, names(&["ghost"])),
            other => panic!("expected UnknownApps, got {other:?}"),
        }
        assert!(fleet.sync_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_batch_size_rejected() {
        let fleet = MockFleet::new(&["svc-a"]);
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["svc-a"])));
        options.batch_size = 0;

        let (result, snapshots) = run(&fleet, options).await;
        assert!(matches!(result, Err(BatchSyncError::InvalidBatchSize)));
        assert!(snapshots.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_size_one_is_strictly_sequential() {
        let fleet = MockFleet::new(&["a", "b", "c"]);
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["c", "a", "b"])));
        options.batch_size = 1;

        let (result, snapshots) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(summary.success);
        assert_eq!(summary.total_batches, 3);
        assert_eq!(fleet.sync_log(), names(&["c", "a", "b"]));

        let started: Vec<Vec<String>> = snapshots
            .iter()
            .filter(|s| s.phase == Phase::BatchStart)
            .map(|s| s.batch_apps.clone())
            .collect();
        assert_eq!(started, vec![names(&["c"]), names(&["a"]), names(&["b"])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_skips_later_batches() {
        let fleet = MockFleet::new(&["a", "b", "c", "d", "e"]).with_health("c", Health::Never);
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["a", "b", "c", "d", "e"])));
        options.batch_size = 2;
        options.max_attempts = 2;
        options.health_timeout = Duration::from_secs(30);

        let (result, snapshots) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(!summary.success);
        assert_eq!(summary.completed_apps, names(&["a", "b"]));
        assert_eq!(summary.failed_apps, names(&["c"]));
        assert_eq!(summary.skipped_apps, names(&["e"]));
        assert_eq!(summary.completed_batches, 1);
        assert_eq!(fleet.sync_count("c"), 2);
        assert_eq!(fleet.sync_count("e"), 0);

        let tail: Vec<Phase> = phases(&snapshots).into_iter().rev().take(2).collect();
        assert_eq!(tail, vec![Phase::Aborted, Phase::BatchFailed]);
        assert!(snapshots.iter().any(|s| s.phase == Phase::Retrying));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_batch_never_healthy_scenario() {
        let fleet = MockFleet::new(&["svc-a", "svc-b", "svc-c", "svc-d"])
            .with_health("svc-c", Health::Never)
            .with_health("svc-d", Health::Never);
        let mut options = BatchSyncOptions::new(SyncTarget::Pattern("svc-*".to_string()));
        options.batch_size = 2;
        options.max_attempts = 2;

        let (result, _) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(!summary.success);
        assert_eq!(summary.completed_apps, names(&["svc-a", "svc-b"]));
        assert!(summary
            .failed_apps
            .iter()
            .all(|a| a == "svc-c" || a == "svc-d"));
        assert!(summary.skipped_apps.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_batch() {
        let fleet = MockFleet::new(&["a", "b"]).with_health("b", Health::HealthyAfterSyncs(2));
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["a", "b"])));
        options.health_timeout = Duration::from_secs(20);

        let (result, snapshots) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(summary.success);
        assert_eq!(fleet.sync_count("b"), 2);
        let retry = snapshots
            .iter()
            .find(|s| s.phase == Phase::Retrying)
            .unwrap();
        assert_eq!(retry.attempt, 1);
        assert_eq!(retry.max_retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_error_and_poll_error_are_captured() {
        let fleet = MockFleet::new(&["a", "b", "c"])
            .with_failing_syncs("a", 1)
            .with_health("a", Health::Never)
            .with_health("b", Health::PollError);
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["a", "b", "c"])));
        options.max_attempts = 1;
        options.health_timeout = Duration::from_secs(10);

        let (result, snapshots) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(!summary.success);
        assert_eq!(summary.failed_apps, names(&["a", "b"]));

        let poll = snapshots
            .iter()
            .find(|s| s.phase == Phase::Polling)
            .unwrap();
        assert_eq!(poll.app_statuses["a"], AppStatus::new("Synced", "Degraded"));
        assert_eq!(poll.app_statuses["b"], AppStatus::unknown());
        assert!(poll.app_statuses["c"].is_healthy());
        assert_eq!(poll.app_statuses.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_sync_still_polled() {
        let fleet = MockFleet::new(&["a"]).with_failing_syncs("a", 1);
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["a"])));
        options.max_attempts = 1;

        let (result, snapshots) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(summary.success);
        assert_eq!(summary.completed_apps, names(&["a"]));
        assert_eq!(fleet.sync_log(), names(&["a"]));
        let polls: Vec<_> = snapshots
            .iter()
            .filter(|s| s.phase == Phase::Polling)
            .collect();
        assert_eq!(polls.len(), 1);
        assert!(polls[0].app_statuses["a"].is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_sync_then_healthy_completes_batch() {
        let fleet = MockFleet::new(&["a", "b"])
            .with_failing_syncs("b", 1)
            .with_health("b", Health::HealthyAfterPolls(2));
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["a", "b"])));
        options.max_attempts = 1;
        options.health_timeout = Duration::from_secs(60);

        let (result, snapshots) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(summary.success);
        assert_eq!(summary.completed_apps, names(&["a", "b"]));
        assert_eq!(fleet.sync_count("b"), 0);
        assert!(!snapshots.iter().any(|s| s.phase == Phase::Retrying));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_poll_errors_recover_within_attempt() {
        let fleet = MockFleet::new(&["a", "b"]).with_health("a", Health::ErrorThenHealthy(2));
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["a", "b"])));
        options.max_attempts = 1;
        options.health_timeout = Duration::from_secs(60);

        let (result, snapshots) = run(&fleet, options).await;
        let summary = result.unwrap();

        assert!(summary.success);
        assert_eq!(fleet.sync_count("a"), 1);

        let polls: Vec<_> = snapshots
            .iter()
            .filter(|s| s.phase == Phase::Polling)
            .collect();
        assert_eq!(polls.len(), 3);
        assert_eq!(polls[0].app_statuses["a"], AppStatus::unknown());
        assert_eq!(polls[1].app_statuses["a"], AppStatus::unknown());
        assert!(polls[2].app_statuses["a"].is_healthy());
        assert!(polls.iter().all(|p| p.attempt == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_batch_waits_for_previous() {
        let fleet = MockFleet::new(&["a", "b", "c"]).with_health("a", Health::HealthyAfterPolls(3));
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["a", "b", "c"])));
        options.batch_size = 2;

        let (result, _) = run(&fleet, options).await;
        assert!(result.unwrap().success);

        let times = fleet.sync_times();
        let first_batch_done = times["a"].max(times["b"]);
        assert!(times["c"] >= first_batch_done + POLL_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_marks_remaining_skipped() {
        let fleet = MockFleet::new(&["a", "b", "c"]).with_health("a", Health::Never);
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["a", "b", "c"])));
        options.batch_size = 1;

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            canceller.cancel();
        });

        let (seen, sink) = recorder();
        let summary = run_batch_sync(&fleet, &options, &*sink, &cancel)
            .await
            .unwrap();

        assert!(!summary.success);
        assert_eq!(summary.skipped_apps, names(&["a", "b", "c"]));
        assert_eq!(summary.message, "Batch sync cancelled");
        let last = seen.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.phase, Phase::Aborted);
        assert_eq!(fleet.sync_count("b"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_clamped_to_one() {
        let fleet = MockFleet::new(&["a"]);
        let mut options = BatchSyncOptions::new(SyncTarget::Apps(names(&["a"])));
        options.max_attempts = 0;

        let (result, snapshots) = run(&fleet, options).await;
        assert!(result.unwrap().success);
        assert!(snapshots.iter().all(|s| s.max_retries == 0));
    }
}
