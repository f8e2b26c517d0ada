//! Output renderers and formatting helpers for replay results.

use std::fmt::Write as _;

use anyhow::anyhow;
use riptide_sync::{CategoryCounters, TorrentId};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};
use crate::replay::{StepReport, StepResult};

#[derive(Serialize)]
struct ReplayDocument<'a> {
    steps: &'a [StepReport],
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<&'a str>,
}

pub(crate) fn render_replay(
    reports: &[StepReport],
    metrics: Option<&str>,
    format: OutputFormat,
) -> CliResult<()> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&ReplayDocument {
            steps: reports,
            metrics,
        })
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?,
        OutputFormat::Table => {
            let mut text = format_table(reports);
            if let Some(metrics) = metrics {
                text.push_str(metrics);
            }
            text
        }
    };
    println!("{}", text.trim_end());
    Ok(())
}

pub(crate) fn format_table(reports: &[StepReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(out, "step {}: {}", report.index, describe(&report.result));
        let _ = writeln!(
            out,
            "  tracked: {}  visible: {}",
            report.tracked, report.visible
        );
        let _ = writeln!(out, "  counters: {}", format_counters(&report.counters));
    }
    out
}

fn describe(result: &StepResult) -> String {
    match result {
        StepResult::Applied { outcome } => format!(
            "{} -> cursor {} | added [{}] updated [{}] removed [{}] | shown [{}] hidden [{}]",
            outcome.shape.as_str(),
            outcome.cursor,
            join_ids(&outcome.report.added),
            join_ids(&outcome.report.updated),
            join_ids(&outcome.report.removed),
            join_ids(&outcome.visibility.shown),
            join_ids(&outcome.visibility.hidden),
        ),
        StepResult::Rejected { error } => format!("rejected: {error}"),
        StepResult::Selected { changes } => format!(
            "selection | shown [{}] hidden [{}]",
            join_ids(&changes.shown),
            join_ids(&changes.hidden),
        ),
        StepResult::Reordered { plan } if plan.is_empty() => {
            format!("reorder {} | nothing to move", plan.direction.as_str())
        }
        StepResult::Reordered { plan } => format!(
            "reorder {} | submit [{}]",
            plan.direction.as_str(),
            join_ids(&plan.ids),
        ),
    }
}

fn join_ids(ids: &[TorrentId]) -> String {
    ids.iter()
        .map(TorrentId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_counters(counters: &CategoryCounters) -> String {
    counters
        .iter()
        .map(|(category, count)| format!("{category}={count}"))
        .collect::<Vec<_>>()
        .join(" ")
}
