//! CLI command definitions for the `aura` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod directive;
pub mod memory;
pub mod run;
pub mod status;
pub mod summarize;

use clap::{Parser, Subcommand};

/// Decision & memory engine of the Aura Bluesky agent.
#[derive(Parser)]
#[command(name = "aura", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "AURA_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Monitor notifications and reply until interrupted.
    Run,

    /// Run a single poll cycle and exit.
    Once,

    /// Inspect stored memory.
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },

    /// Regenerate summaries now.
    Summarize {
        /// Subject to refresh (`user:<handle>` or `topic:<name>`).
        /// Without it, users active in the last 24 hours are refreshed.
        subject: Option<String>,

        /// Regenerate even when the cached summary is younger than
        /// `summary_max_age_secs`.
        #[arg(long)]
        force: bool,
    },

    /// Show or extend the admin directive log.
    Directive {
        #[command(subcommand)]
        action: DirectiveCommand,
    },

    /// Store statistics and configuration overview.
    Status {
        /// Also send a minimal request to the configured model.
        #[arg(long)]
        check_model: bool,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Facts stored about a user.
    User {
        /// Bluesky handle, with or without a leading '@'.
        handle: String,
    },

    /// General knowledge matching any of the terms.
    Knowledge {
        /// Search terms (topic, content, or tag). Empty lists the latest.
        terms: Vec<String>,

        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Cached summary of a subject (`user:<handle>` or `topic:<name>`).
    Summary { subject: String },

    /// Recent posts by a user, newest first.
    Posts {
        handle: String,

        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum DirectiveCommand {
    /// Show the directive log, oldest first.
    #[command(alias = "ls")]
    List,

    /// Append a directive as the local operator.
    Add {
        /// The instruction to layer on top of the persona.
        instruction: String,
    },
}

/// Strip a leading '@' from a handle typed on the command line.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}
