//! Output formatting utilities for the CLI.

use std::collections::BTreeMap;
use std::time::Duration;

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;

use crate::domain::models::{
    ApplyLog, EntryStatus, FailureCluster, IterationSummary, JudgeKind, JudgeScore, PatchProposal,
    RiskLevel,
};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

pub fn percent(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{:.1}%", r * 100.0))
}

/// Spinner on stderr for long operations; hidden in JSON mode
pub fn spinner(message: &str, json_mode: bool) -> ProgressBar {
    if json_mode {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("[{elapsed_precise}] {spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn base_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
    table
}

/// Per-judge pass rates against their thresholds
pub fn judge_table(
    scores: &BTreeMap<JudgeKind, JudgeScore>,
    thresholds: &BTreeMap<String, f64>,
) -> Table {
    let mut table = base_table(&["Judge", "Pass", "Fail", "Unknown", "Skipped", "Rate", "Target"]);
    for (kind, score) in scores {
        let target = thresholds.get(kind.as_str()).copied();
        let below = matches!((score.pass_rate, target), (Some(rate), Some(t)) if rate < t);
        let rate_cell = Cell::new(percent(score.pass_rate)).set_alignment(CellAlignment::Right);
        table.add_row(vec![
            Cell::new(kind.as_str()),
            Cell::new(score.passed).set_alignment(CellAlignment::Right),
            Cell::new(score.failed).set_alignment(CellAlignment::Right),
            Cell::new(score.unknown).set_alignment(CellAlignment::Right),
            Cell::new(score.skipped).set_alignment(CellAlignment::Right),
            if below { rate_cell.fg(Color::Red) } else { rate_cell },
            Cell::new(percent(target)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// One row per loop iteration, the best one marked
pub fn iteration_table(iterations: &[IterationSummary], best: usize) -> Table {
    let mut table = base_table(&["#", "Accuracy", "Failing", "Clusters", "Proposals", "Apply", "Drift"]);
    for it in iterations {
        let marker = if it.iteration == best {
            format!("{}*", it.iteration)
        } else {
            it.iteration.to_string()
        };
        let drift = it
            .cross_iteration
            .as_ref()
            .map_or_else(|| "-".to_string(), |c| c.changed.len().to_string());
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(percent(Some(it.accuracy))).set_alignment(CellAlignment::Right),
            Cell::new(it.failing_questions).set_alignment(CellAlignment::Right),
            Cell::new(it.clusters).set_alignment(CellAlignment::Right),
            Cell::new(it.proposals).set_alignment(CellAlignment::Right),
            Cell::new(it.apply.as_str()),
            Cell::new(drift).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn cluster_table(clusters: &[FailureCluster]) -> Table {
    let mut table = base_table(&["ID", "Type", "Questions", "Judge", "Confidence", "Root cause"]);
    for cluster in clusters {
        table.add_row(vec![
            Cell::new(&cluster.id),
            Cell::new(cluster.failure_type.as_str()),
            Cell::new(cluster.size()).set_alignment(CellAlignment::Right),
            Cell::new(cluster.affected_judge.as_str()),
            Cell::new(format!("{:.2}", cluster.confidence)).set_alignment(CellAlignment::Right),
            Cell::new(truncate(&cluster.root_cause, 60)),
        ]);
    }
    table
}

pub fn proposal_table(proposals: &[PatchProposal]) -> Table {
    let mut table = base_table(&["ID", "Cluster", "Patch", "Target", "Risk", "Impact", "New value"]);
    for proposal in proposals {
        let risk = Cell::new(proposal.risk.as_str());
        let risk = match proposal.risk {
            RiskLevel::High => risk.fg(Color::Red),
            RiskLevel::Medium => risk.fg(Color::Yellow),
            RiskLevel::Low => risk,
        };
        table.add_row(vec![
            Cell::new(&proposal.id),
            Cell::new(&proposal.cluster_id),
            Cell::new(proposal.patch_type.as_str()),
            Cell::new(&proposal.target),
            risk,
            Cell::new(format!("{:.2}", proposal.net_impact)).set_alignment(CellAlignment::Right),
            Cell::new(truncate(&proposal.new_value, 50)),
        ]);
    }
    table
}

pub fn apply_log_table(log: &ApplyLog) -> Table {
    let mut table = base_table(&["Proposal", "Target", "Action", "Status", "Error"]);
    for entry in &log.entries {
        let status = Cell::new(entry.status.as_str());
        let status = match entry.status {
            EntryStatus::Failed => status.fg(Color::Red),
            EntryStatus::RolledBack => status.fg(Color::Yellow),
            EntryStatus::Applied => status.fg(Color::Green),
            EntryStatus::NoOp => status,
        };
        table.add_row(vec![
            Cell::new(&entry.proposal_id),
            Cell::new(&entry.target),
            Cell::new(entry.action.as_str()),
            status,
            Cell::new(entry.error.as_deref().unwrap_or("")),
        ]);
    }
    table
}
