//! `tuneloop run`: one full evaluate, diagnose and repair pass.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::warn;

use super::ScopeArgs;
use crate::cli::context::AppContext;
use crate::cli::output::{
    apply_log_table, cluster_table, iteration_table, judge_table, output, percent,
    proposal_table, spinner, CommandOutput,
};
use crate::domain::models::{ApplyOutcome, RunSummary, StopReason};
use crate::services::{Orchestrator, RunOptions};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Allow high-risk patch sets to be applied
    #[arg(long)]
    pub confirm: bool,

    /// Stop after validation; nothing is written
    #[arg(long)]
    pub dry_run: bool,

    /// Regenerate each question to score query stability
    #[arg(long)]
    pub repeatability: bool,

    /// Most evaluate, diagnose and repair passes [default: optimizer.max_iterations]
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_iterations: Option<u16>,
}

/// Rendered run summary
#[derive(Debug, Serialize)]
pub struct RunOutput {
    #[serde(flatten)]
    pub summary: RunSummary,
    #[serde(skip)]
    pub thresholds: std::collections::BTreeMap<String, f64>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut lines = vec![
            format!("Run {}", s.run_id),
            format!(
                "Scope: {}   Profile: {}   Evaluated: {}/{}",
                s.scope, s.judge_profile, s.evaluated, s.total_questions
            ),
            format!(
                "Accuracy: {}   Thresholds met: {}",
                percent(Some(s.accuracy)),
                if s.thresholds_met { "yes" } else { "no" }
            ),
        ];

        for excluded in &s.excluded {
            lines.push(format!("  excluded {}: {}", excluded.question_id, excluded.reason));
        }
        for warning in &s.warnings {
            lines.push(format!("  warning: {warning}"));
        }

        lines.push(String::new());
        lines.push(judge_table(&s.judge_scores, &self.thresholds).to_string());

        if let Some(report) = &s.repeatability {
            let classes: Vec<String> = report.classes.iter().map(|(k, v)| format!("{k}={v}")).collect();
            lines.push(format!(
                "Repeatability: {:.1}% average agreement ({})",
                report.average_pct,
                classes.join(" ")
            ));
        }

        if !s.arbiter_outcomes.is_empty() {
            let outcomes: Vec<String> = s
                .arbiter_outcomes
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            lines.push(format!("Arbiter: {}", outcomes.join(" ")));
        }
        for correction in &s.corrections {
            if correction.dry_run {
                lines.push(format!(
                    "Would correct expected query for {} to v{} (dry run)",
                    correction.question_id, correction.new_version
                ));
            } else {
                lines.push(format!(
                    "Corrected expected query for {} (now v{})",
                    correction.question_id, correction.new_version
                ));
            }
        }

        if !s.clusters.clusters.is_empty() {
            lines.push(String::new());
            lines.push(format!("Failure clusters ({}):", s.clusters.clusters.len()));
            lines.push(cluster_table(&s.clusters.clusters).to_string());
        }
        if !s.clusters.long_tail.is_empty() {
            lines.push(format!("Long tail: {}", s.clusters.long_tail.join(", ")));
        }

        if !s.proposals.is_empty() {
            lines.push(String::new());
            lines.push(format!("Proposals ({}):", s.proposals.len()));
            lines.push(proposal_table(&s.proposals).to_string());
        }
        for rec in &s.recommendations {
            lines.push(format!("Recommendation [{}] {}: {}", rec.cluster_id, rec.pattern, rec.recommendation));
        }

        if let Some(validation) = &s.validation {
            for conflict in &validation.conflicts {
                lines.push(format!(
                    "Conflict: {} vs {} ({})",
                    conflict.first, conflict.second, conflict.rule
                ));
            }
            for issue in &validation.issues {
                lines.push(format!("Validation: {issue}"));
            }
        }

        lines.push(String::new());
        lines.push(apply_line(&s.apply));
        if let Some(log) = s.apply.log() {
            lines.push(apply_log_table(log).to_string());
        }

        if s.iterations.len() > 1 {
            lines.push(String::new());
            lines.push(format!("Iterations ({}):", s.iterations.len()));
            lines.push(iteration_table(&s.iterations, s.best_iteration).to_string());
        }
        if s.stop_reason != StopReason::EvaluationOnly {
            lines.push(format!(
                "Stopped: {}   Best iteration: {}",
                s.stop_reason, s.best_iteration
            ));
        }

        if !s.errors.is_empty() {
            lines.push(format!("{} question error(s); see --json for details", s.errors.len()));
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn apply_line(outcome: &ApplyOutcome) -> String {
    match outcome {
        ApplyOutcome::NotAttempted { reason } => format!("Apply: not attempted ({reason})"),
        ApplyOutcome::Rejected { reason } => format!("Apply: rejected ({reason})"),
        ApplyOutcome::AwaitingConfirmation => {
            "Apply: high-risk patch set awaits confirmation; rerun with --confirm".to_string()
        }
        ApplyOutcome::DryRun => "Apply: dry run, nothing written".to_string(),
        ApplyOutcome::Applied { verification, .. } => match verification {
            Some(report) => format!("Apply: applied and verified over {} questions", report.questions),
            None => "Apply: applied".to_string(),
        },
        ApplyOutcome::RolledBack { reason, .. } => format!("Apply: rolled back ({reason})"),
        ApplyOutcome::Failed { error, .. } => format!("Apply: failed and reverted ({error})"),
    }
}

/// Run with Ctrl-C wired to the orchestrator's cancellation token
pub(crate) async fn run_with_cancellation(
    orchestrator: &Orchestrator,
    options: RunOptions,
    json_mode: bool,
) -> Result<RunSummary> {
    let token = orchestrator.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight questions");
            token.cancel();
        }
    });

    let pb = spinner(&format!("Evaluating {} scope", options.scope), json_mode);
    let result = orchestrator.run(options).await;
    pb.finish_and_clear();
    watcher.abort();

    result.context("Run failed")
}

pub async fn execute(args: RunArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let scope = args.scope.to_scope()?;
    let orchestrator = ctx.orchestrator().await?;

    let options = RunOptions {
        confirm: args.confirm,
        dry_run: args.dry_run,
        repeatability: args.repeatability,
        max_iterations: args
            .max_iterations
            .map_or(ctx.config.optimizer.max_iterations, usize::from),
        ..RunOptions::optimize(scope)
    };
    let summary = run_with_cancellation(&orchestrator, options, json_mode).await?;

    output(
        &RunOutput {
            summary,
            thresholds: ctx.config.evaluation.thresholds.clone(),
        },
        json_mode,
    );
    Ok(())
}
