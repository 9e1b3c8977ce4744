//! `aura directive`: the admin directive log.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use aura_core::repository::directive::DirectiveRepository;

use super::DirectiveCommand;
use crate::state::AppState;

/// Author recorded for directives added from the command line.
const LOCAL_OPERATOR: &str = "local:cli";

pub async fn dispatch(state: &AppState, action: DirectiveCommand, json: bool) -> Result<()> {
    match action {
        DirectiveCommand::List => list(state, json).await,
        DirectiveCommand::Add { instruction } => add(state, &instruction, json).await,
    }
}

async fn list(state: &AppState, json: bool) -> Result<()> {
    let directives = state.directive_repo().list_directives().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&directives)?);
        return Ok(());
    }
    if directives.is_empty() {
        println!();
        println!("  {} No directives. The persona is used as configured.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Instruction").fg(Color::White),
        Cell::new("Author").fg(Color::White),
        Cell::new("Date").fg(Color::White),
    ]);
    for directive in &directives {
        table.add_row(vec![
            Cell::new(directive.id).fg(Color::DarkGrey),
            Cell::new(&directive.instruction).fg(Color::White),
            Cell::new(&directive.author_did).fg(Color::Cyan),
            Cell::new(directive.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {}", style("Later directives take precedence over earlier ones.").dim());
    println!();
    Ok(())
}

async fn add(state: &AppState, instruction: &str, json: bool) -> Result<()> {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        bail!("directive instruction must not be empty");
    }
    if let Some(term) = state.blocklist.find(instruction) {
        bail!("directive contains blocked term '{term}'");
    }

    let directive = state.directive_repo().append_directive(instruction, LOCAL_OPERATOR).await?;
    tracing::info!(id = directive.id, "Directive appended from CLI");

    if json {
        println!("{}", serde_json::to_string_pretty(&directive)?);
    } else {
        println!();
        println!("  {} Directive #{} recorded", style("✓").green(), directive.id);
        println!();
    }
    Ok(())
}
