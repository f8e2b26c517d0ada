//! Scripted replay of list payloads, filter selections and queue moves.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use riptide_sync::{
    Category, CategoryCounters, Cursor, FilterSelection, ListPayload, QueueDirection,
    ReorderPlan, SyncClient, SyncConfig, SyncEngine, SyncOutcome, TorrentId, Transport,
    VisibilityChanges,
};
use riptide_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CliError, CliResult};

/// Replay script as stored on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReplayScript {
    #[serde(default)]
    pub(crate) config: Option<SyncConfig>,
    pub(crate) steps: Vec<ReplayStep>,
}

/// One scripted step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ReplayStep {
    Payload(ListPayload),
    Select {
        #[serde(default)]
        categories: Vec<Category>,
    },
    Reorder {
        ids: Vec<TorrentId>,
        direction: QueueDirection,
    },
}

/// Result of a single step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum StepResult {
    Applied { outcome: SyncOutcome },
    Rejected { error: String },
    Selected { changes: VisibilityChanges },
    Reordered { plan: ReorderPlan },
}

/// Step result plus the engine state observed afterwards.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct StepReport {
    pub(crate) index: usize,
    pub(crate) result: StepResult,
    pub(crate) counters: CategoryCounters,
    pub(crate) tracked: usize,
    pub(crate) visible: usize,
}

/// Options controlling a replay run.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ReplayOptions {
    pub(crate) verify: bool,
}

/// Transport that serves staged payloads and records submitted plans.
#[derive(Default)]
pub(crate) struct ScriptTransport {
    staged: Mutex<VecDeque<ListPayload>>,
    submitted: Mutex<Vec<ReorderPlan>>,
}

impl ScriptTransport {
    fn stage(&self, payload: ListPayload) -> anyhow::Result<()> {
        self.staged
            .lock()
            .map_err(|_| anyhow!("staged payload queue poisoned"))?
            .push_back(payload);
        Ok(())
    }

    pub(crate) fn submitted(&self) -> anyhow::Result<Vec<ReorderPlan>> {
        Ok(self
            .submitted
            .lock()
            .map_err(|_| anyhow!("submitted plan log poisoned"))?
            .clone())
    }
}

#[async_trait]
impl Transport for ScriptTransport {
    async fn fetch(&self, cursor: &Cursor) -> anyhow::Result<ListPayload> {
        debug!(cursor = %cursor, "serving staged payload");
        self.staged
            .lock()
            .map_err(|_| anyhow!("staged payload queue poisoned"))?
            .pop_front()
            .ok_or_else(|| anyhow!("no payload staged for cursor '{cursor}'"))
    }

    async fn submit_reorder(&self, plan: &ReorderPlan) -> anyhow::Result<()> {
        self.submitted
            .lock()
            .map_err(|_| anyhow!("submitted plan log poisoned"))?
            .push(plan.clone());
        Ok(())
    }
}

/// Load a replay script from disk.
pub(crate) fn load_script(path: &Path) -> CliResult<ReplayScript> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        CliError::validation(format!(
            "failed to read script '{}': {err}",
            path.display()
        ))
    })?;
    serde_json::from_str(&raw).map_err(|err| {
        CliError::validation(format!("invalid script '{}': {err}", path.display()))
    })
}

/// Load an engine configuration file.
pub(crate) fn load_config(path: &Path) -> CliResult<SyncConfig> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        CliError::validation(format!(
            "failed to read config '{}': {err}",
            path.display()
        ))
    })?;
    serde_json::from_str(&raw).map_err(|err| {
        CliError::validation(format!("invalid config '{}': {err}", path.display()))
    })
}

/// Drive every step of `script` through a fresh engine.
pub(crate) async fn replay(
    script: ReplayScript,
    config: SyncConfig,
    options: ReplayOptions,
    metrics: Option<Metrics>,
) -> CliResult<(Vec<StepReport>, Vec<ReorderPlan>)> {
    let engine = SyncEngine::try_new(config)
        .map_err(|err| CliError::validation(format!("invalid engine configuration: {err}")))?;

    let mut client = SyncClient::new(ScriptTransport::default(), engine);
    if let Some(metrics) = metrics {
        client = client.with_metrics(metrics);
    }

    let mut reports = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.into_iter().enumerate() {
        let result = run_step(&client, step).await?;
        let report = client
            .with_engine(|engine| StepReport {
                index,
                result,
                counters: engine.counters().clone(),
                tracked: engine.store().len(),
                visible: engine.visible_ids().len(),
            })
            .await;

        if options.verify {
            let check = client.with_engine(|engine| engine.verify_counters()).await;
            if !check.is_consistent() {
                return Err(CliError::failure(anyhow!(
                    "category counters diverged from recount after step {index}"
                )));
            }
        }
        reports.push(report);
    }

    let submitted = client.transport().submitted().map_err(CliError::failure)?;
    info!(
        steps = reports.len(),
        reorders = submitted.len(),
        "replay finished"
    );
    Ok((reports, submitted))
}

async fn run_step(
    client: &SyncClient<ScriptTransport>,
    step: ReplayStep,
) -> CliResult<StepResult> {
    match step {
        ReplayStep::Payload(payload) => {
            client.transport().stage(payload).map_err(CliError::failure)?;
            match client.poll_once().await {
                Ok(outcome) => Ok(StepResult::Applied { outcome }),
                Err(err) => Ok(StepResult::Rejected {
                    error: format!("{err:#}"),
                }),
            }
        }
        ReplayStep::Select { categories } => {
            let selection: FilterSelection = categories.into_iter().collect();
            let changes = client.set_selection(selection).await;
            Ok(StepResult::Selected { changes })
        }
        ReplayStep::Reorder { ids, direction } => {
            let plan = client
                .move_queue(&ids, direction)
                .await
                .context("queue move failed")
                .map_err(CliError::failure)?;
            Ok(StepResult::Reordered { plan })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCRIPT: &str = r#"{
        "steps": [
            {"type": "payload", "cursor": "1", "full": [
                {"id": "t1", "status": 1, "progress": 1000, "upload_speed": 0,
                 "download_speed": 0, "queue_position": 1, "labels": []},
                {"id": "t2", "status": 1, "progress": 500, "upload_speed": 0,
                 "download_speed": 0, "queue_position": 2, "labels": ["x"]}
            ]},
            {"type": "select", "categories": ["label:x"]},
            {"type": "payload", "cursor": "2", "changed": [{"id": "t3"}]},
            {"type": "reorder", "ids": ["t2"], "direction": "top"},
            {"type": "payload", "cursor": "3", "changed": [
                {"id": "t1", "status": 1, "progress": 1000, "upload_speed": 0,
                 "download_speed": 0, "queue_position": 2, "labels": ["x"]}
            ], "removed": ["t2"]}
        ]
    }"#;

    fn script() -> ReplayScript {
        serde_json::from_str(SCRIPT).expect("script parses")
    }

    #[tokio::test]
    async fn replay_reports_every_step() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let (reports, submitted) = replay(
            script(),
            SyncConfig::default(),
            ReplayOptions { verify: true },
            Some(metrics.clone()),
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        assert_eq!(reports.len(), 5);
        assert!(matches!(reports[0].result, StepResult::Applied { .. }));
        assert_eq!(reports[0].counters.get(&Category::All), 2);
        assert!(matches!(reports[2].result, StepResult::Rejected { .. }));
        match &reports[1].result {
            StepResult::Selected { changes } => {
                assert_eq!(changes.hidden, vec![TorrentId::from("t1")]);
            }
            other => panic!("unexpected step result: {other:?}"),
        }
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].ids, vec![TorrentId::from("t2")]);

        let last = &reports[4];
        assert_eq!(last.tracked, 1);
        assert_eq!(last.visible, 1);
        assert_eq!(last.counters.get(&Category::label("x")), 1);
        assert_eq!(metrics.snapshot().malformed_payloads_total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_config_is_a_validation_error() {
        let config = SyncConfig {
            completion_per_mille: 5_000,
            ..SyncConfig::default()
        };
        let err = replay(script(), config, ReplayOptions::default(), None)
            .await
            .expect_err("config must be rejected");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn scripts_and_configs_load_from_disk() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(SCRIPT.as_bytes())?;
        let loaded = load_script(file.path()).map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(loaded.steps.len(), 5);

        let mut config = tempfile::NamedTempFile::new()?;
        config.write_all(br#"{"activity_threshold_bps": 10}"#)?;
        let parsed = load_config(config.path()).map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(parsed.activity_threshold_bps, 10);
        assert_eq!(parsed.completion_per_mille, 1_000);

        let mut unknown = tempfile::NamedTempFile::new()?;
        unknown.write_all(br#"{"threshold": 10}"#)?;
        assert!(load_config(unknown.path()).is_err());
        assert!(load_script(Path::new("/nonexistent/script.json")).is_err());
        Ok(())
    }
}
