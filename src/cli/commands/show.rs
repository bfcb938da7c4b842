//! `tuneloop show`: inspect persisted runs.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets, Table};
use serde::Serialize;

use super::run::RunOutput;
use crate::cli::context::AppContext;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::EvaluationRecord;
use crate::domain::ports::RunStore;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Run id; lists runs when omitted
    pub run_id: Option<String>,

    /// Include per-question records
    #[arg(long)]
    pub records: bool,
}

#[derive(Debug, Serialize)]
pub struct RunListOutput {
    pub runs: Vec<String>,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        if self.runs.is_empty() {
            return "No runs found.".to_string();
        }
        let mut lines = vec![format!("{} run(s):", self.runs.len())];
        lines.extend(self.runs.iter().map(|r| format!("  {r}")));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct RunDetailOutput {
    pub run: RunOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<EvaluationRecord>>,
}

impl CommandOutput for RunDetailOutput {
    fn to_human(&self) -> String {
        let mut text = self.run.to_human();
        if let Some(records) = &self.records {
            let mut table = Table::new();
            table
                .load_preset(presets::UTF8_FULL)
                .set_header(vec!["Question", "Correct", "Match", "Failures", "Generated"]);
            for record in records {
                let failures: Vec<&str> = record.failures().map(|(k, _)| k.as_str()).collect();
                table.add_row(vec![
                    record.question_id.clone(),
                    if record.is_correct() { "yes" } else { "no" }.to_string(),
                    record.comparison.match_type.as_str().to_string(),
                    failures.join(", "),
                    truncate(record.generated_query.as_deref().unwrap_or("-"), 50),
                ]);
            }
            text.push_str("\n\n");
            text.push_str(&table.to_string());
        }
        text
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ShowArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let store = ctx.run_store();

    let Some(run_id) = args.run_id else {
        let runs = store.list_runs().await.context("Failed to list runs")?;
        output(&RunListOutput { runs }, json_mode);
        return Ok(());
    };

    let summary = store
        .load_summary(&run_id)
        .await
        .with_context(|| format!("Run {run_id} not found"))?;
    let records = if args.records {
        Some(
            store
                .load_records(&run_id)
                .await
                .with_context(|| format!("Failed to read records for run {run_id}"))?,
        )
    } else {
        None
    };

    output(
        &RunDetailOutput {
            run: RunOutput {
                summary,
                thresholds: ctx.config.evaluation.thresholds.clone(),
            },
            records,
        },
        json_mode,
    );
    Ok(())
}
