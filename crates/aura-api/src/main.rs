//! Aura CLI entry point.
//!
//! Binary name: `aura`
//!
//! Parses CLI arguments, sets up tracing, opens the store, then dispatches
//! to the requested command.

mod cli;
mod state;

use clap::Parser;

use aura_observe::tracing_setup::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        format: if cli.log_json { LogFormat::Json } else { LogFormat::Pretty },
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Run => cli::run::run(&state).await,
        Commands::Once => cli::run::once(&state, cli.json).await,
        Commands::Memory { action } => cli::memory::dispatch(&state, action, cli.json).await,
        Commands::Summarize { subject, force } => cli::summarize::summarize(&state, subject, force, cli.json).await,
        Commands::Directive { action } => cli::directive::dispatch(&state, action, cli.json).await,
        Commands::Status { check_model } => cli::status::status(&state, check_model, cli.json).await,
    }
}
