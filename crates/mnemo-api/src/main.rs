//! mnemo CLI entry point.
//!
//! Binary name: `mnemo`
//!
//! Parses CLI arguments, sets up tracing, opens the database and services,
//! then dispatches to the command handler inside a root span.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing::Instrument;

use mnemo_core::embedding::Embedder;
use mnemo_observe::attrs;
use mnemo_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing, TracingOptions};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        default_filter: filter_for_verbosity(cli.verbose, cli.quiet).to_string(),
        json: cli.log_json,
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "mnemo", &mut std::io::stdout());
        return Ok(());
    }

    let (operation, workspace) = cli.command.operation();
    let span = tracing::info_span!(
        "mnemo.command",
        { attrs::MNEMO_OPERATION_NAME } = operation,
        { attrs::MNEMO_WORKSPACE_ID } = tracing::field::Empty,
        { attrs::MNEMO_DRY_RUN } = cli.command.dry_run(),
        { attrs::MNEMO_EMBEDDING_MODEL } = tracing::field::Empty,
    );
    if let Some(workspace) = workspace {
        span.record(attrs::MNEMO_WORKSPACE_ID, tracing::field::display(workspace));
    }

    let result = run(cli, span.clone()).instrument(span).await;

    shutdown_tracing();
    result
}

async fn run(cli: Cli, span: tracing::Span) -> anyhow::Result<()> {
    let state = AppState::init(cli.embedder).await?;
    span.record(attrs::MNEMO_EMBEDDING_MODEL, state.embedder.model_name());

    match cli.command {
        Commands::Decay { action } => cli::decay::handle(&state, action, cli.json).await?,
        Commands::Entity { action } => cli::entity::handle(&state, action, cli.json).await?,
        Commands::Graph { action } => cli::graph::handle(&state, action, cli.json).await?,
        Commands::Conversation { action } => {
            cli::conversation::handle(&state, action, cli.json).await?
        }
        Commands::Completions { .. } => unreachable!("handled before state init"),
    }

    Ok(())
}
