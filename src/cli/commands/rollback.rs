//! `tuneloop rollback`: undo what a previous run applied.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{apply_log_table, output, CommandOutput};
use crate::domain::models::{ApplyLog, EntryStatus};

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Run id, as printed by `tuneloop run`
    pub run_id: String,
}

#[derive(Debug, Serialize)]
pub struct RollbackOutput {
    pub success: bool,
    pub run_id: String,
    pub reverted: usize,
    pub log: ApplyLog,
}

impl CommandOutput for RollbackOutput {
    fn to_human(&self) -> String {
        format!(
            "Rolled back {} edit(s) from run {}\n{}",
            self.reverted,
            self.run_id,
            apply_log_table(&self.log)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RollbackArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let orchestrator = ctx.offline_orchestrator()?;
    let log = orchestrator
        .rollback_run(&args.run_id)
        .await
        .with_context(|| format!("Failed to roll back run {}", args.run_id))?;

    output(
        &RollbackOutput {
            success: true,
            reverted: log.count(EntryStatus::RolledBack),
            run_id: args.run_id,
            log,
        },
        json_mode,
    );
    Ok(())
}
