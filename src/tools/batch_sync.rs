//! Batched rollout tool

use super::args::{self, non_empty};
use super::{Tool, ToolContext, ToolError, ToolOutput};
use crate::batch_sync::{
    run_batch_sync, BatchSyncOptions, BatchSyncProgress, SyncTarget, DEFAULT_BATCH_SIZE,
    DEFAULT_MAX_ATTEMPTS,
};
use crate::llm::{ParamSpec, ToolParameters};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;

pub struct BatchSyncTool;

#[derive(Debug, Deserialize)]
struct BatchSyncInput {
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default, deserialize_with = "app_list")]
    apps: Option<Vec<String>>,
    #[serde(default, deserialize_with = "args::optional_integer")]
    batch_size: Option<i64>,
    #[serde(default, deserialize_with = "args::optional_integer")]
    max_attempts: Option<i64>,
    #[serde(default, deserialize_with = "args::optional_integer")]
    health_timeout_seconds: Option<i64>,
}

/// Comma-separated names or a JSON array; blanks are dropped
fn app_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
    let names: Vec<String> = match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "apps must be a comma-separated string, got {other}"
            )))
        }
    };
    let names: Vec<String> = names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    Ok(if names.is_empty() { None } else { Some(names) })
}

impl BatchSyncInput {
    fn into_options(self) -> Result<BatchSyncOptions, ToolError> {
        let target = match (non_empty(self.pattern), self.apps) {
            (Some(pattern), None) => SyncTarget::Pattern(pattern.trim().to_string()),
            (None, Some(apps)) => SyncTarget::Apps(apps),
            (Some(_), Some(_)) => {
                return Err(ToolError::InvalidArguments(
                    "give either pattern or apps, not both".to_string(),
                ))
            }
            (None, None) => return Err(ToolError::MissingArgument("pattern or apps".to_string())),
        };

        let mut options = BatchSyncOptions::new(target);
        options.batch_size = match self.batch_size {
            None => DEFAULT_BATCH_SIZE,
            Some(n) => usize::try_from(n).map_err(|_| {
                ToolError::InvalidArguments(format!("batch_size must be positive, got {n}"))
            })?,
        };
        options.max_attempts = self
            .max_attempts
            .map_or(DEFAULT_MAX_ATTEMPTS, |n| u32::try_from(n.max(1)).unwrap_or(u32::MAX));
        if let Some(secs) = self.health_timeout_seconds {
            let secs = u64::try_from(secs).map_err(|_| {
                ToolError::InvalidArguments(format!(
                    "health_timeout_seconds must be positive, got {secs}"
                ))
            })?;
            options.health_timeout = Duration::from_secs(secs);
        }
        Ok(options)
    }
}

#[async_trait]
impl Tool for BatchSyncTool {
    fn name(&self) -> &'static str {
        "batch_sync"
    }

    fn description(&self) -> String {
        "Sync several applications in sequential batches, waiting for each batch to become \
         Healthy before starting the next and retrying a failing batch. Select applications \
         with either a glob pattern (e.g. \"svc-*\") or an explicit comma-separated list."
            .to_string()
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::new()
            .optional(
                "pattern",
                ParamSpec::string("Glob over application names, case-insensitive (* and ?)"),
            )
            .optional(
                "apps",
                ParamSpec::string("Comma-separated application names, synced in this order"),
            )
            .optional(
                "batch_size",
                ParamSpec::number("Applications per batch (default 3)"),
            )
            .optional(
                "max_attempts",
                ParamSpec::number("Tries per batch including the first (default 3)"),
            )
            .optional(
                "health_timeout_seconds",
                ParamSpec::number("Seconds to wait for a batch to become Healthy (default 300)"),
            )
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let options = args::parse::<BatchSyncInput>(input)?.into_options()?;

        let sink = ctx.progress().cloned();
        let publish = move |progress: BatchSyncProgress| {
            if let Some(sink) = &sink {
                sink(progress);
            }
        };

        let summary =
            run_batch_sync(ctx.control_plane().as_fleet(), &options, &publish, &ctx.cancel).await?;
        ToolOutput::json(summary)
    }
}
