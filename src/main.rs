//! Tuneloop CLI entry point.

use clap::Parser;

use tuneloop::cli::context::AppContext;
use tuneloop::cli::{commands, handle_error, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = match AppContext::init(cli.config.as_deref(), cli.verbose) {
        Ok(ctx) => ctx,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &ctx, cli.json).await,
        Commands::Evaluate(args) => commands::evaluate::execute(args, &ctx, cli.json).await,
        Commands::Rollback(args) => commands::rollback::execute(args, &ctx, cli.json).await,
        Commands::Show(args) => commands::show::execute(args, &ctx, cli.json).await,
    };

    if let Err(err) = result {
        drop(ctx);
        handle_error(err, cli.json);
    }
}
