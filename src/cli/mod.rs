//! Command-line interface
//!
//! `clap` derive definitions, command implementations and output rendering.

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::evaluate::EvaluateArgs;
use commands::rollback::RollbackArgs;
use commands::run::RunArgs;
use commands::show::ShowArgs;

#[derive(Parser, Debug)]
#[command(name = "tuneloop")]
#[command(about = "Evaluate a natural-language-to-query system and repair its metadata", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .tuneloop/
    #[arg(short, long, global = true, env = "TUNELOOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate, cluster failures, propose and apply metadata patches
    Run(RunArgs),
    /// Evaluate only; no patches are proposed or applied
    Evaluate(EvaluateArgs),
    /// Revert the patches a previous run applied
    Rollback(RollbackArgs),
    /// Show a persisted run, or list runs
    Show(ShowArgs),
}

/// Print an error the way the selected output mode expects and exit non-zero
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{PriorityTier, Scope};

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_slice_scope() {
        let cli = Cli::parse_from([
            "tuneloop",
            "run",
            "--scope",
            "slice",
            "--patched",
            "sales.revenue",
            "--patched",
            "stores",
            "--dry-run",
            "--json",
        ]);
        assert!(cli.json);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.dry_run);
                assert!(!args.confirm);
                assert_eq!(
                    args.scope.to_scope().unwrap(),
                    Scope::Slice {
                        patched: vec!["sales.revenue".to_string(), "stores".to_string()]
                    }
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_evaluate_critical() {
        let cli = Cli::parse_from(["tuneloop", "evaluate", "--scope", "critical"]);
        match cli.command {
            Commands::Evaluate(args) => assert_eq!(
                args.scope.to_scope().unwrap(),
                Scope::Tier {
                    tier: PriorityTier::Critical
                }
            ),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_slice_requires_patched_objects() {
        let cli = Cli::parse_from(["tuneloop", "run", "--scope", "slice"]);
        match cli.command {
            Commands::Run(args) => assert!(args.scope.to_scope().is_err()),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rollback() {
        let cli = Cli::parse_from(["tuneloop", "rollback", "20260101T000000-abcd1234"]);
        assert!(matches!(
            cli.command,
            Commands::Rollback(RollbackArgs { ref run_id }) if run_id == "20260101T000000-abcd1234"
        ));
    }
}
