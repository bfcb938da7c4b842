//! `tuneloop evaluate`: score the benchmarks without touching metadata.

use anyhow::Result;
use clap::Args;

use super::run::{run_with_cancellation, RunOutput};
use super::ScopeArgs;
use crate::cli::context::AppContext;
use crate::cli::output::output;
use crate::services::RunOptions;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Regenerate each question to score query stability
    #[arg(long)]
    pub repeatability: bool,
}

pub async fn execute(args: EvaluateArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let scope = args.scope.to_scope()?;
    let orchestrator = ctx.orchestrator().await?;

    let options = RunOptions {
        repeatability: args.repeatability,
        ..RunOptions::evaluate_only(scope)
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
