//! System status dashboard command.

use anyhow::Result;
use console::style;

use aura_core::repository::conversation::ConversationRepository;
use aura_core::repository::directive::DirectiveRepository;
use aura_core::repository::ledger::InteractionLedger;
use aura_core::repository::memory::MemoryRepository;
use aura_infra::config::Credentials;
use aura_infra::llm::test_provider_connection;
use aura_types::ledger::ProcessedStatus;

use crate::state::AppState;

/// Display store statistics and the active configuration.
pub async fn status(state: &AppState, check_model: bool, json: bool) -> Result<()> {
    let stats = state.memory_repo().stats().await?;
    let ledger = state.ledger();
    let handled = ledger.count_by_status(ProcessedStatus::Handled).await?;
    let failed = ledger.count_by_status(ProcessedStatus::Failed).await?;
    let stopped_threads = state.conversation_repo().count_stopped().await?;
    let directives = state.directive_repo().list_directives().await?.len();
    let config = &state.config;

    let model_check = if check_model {
        let provider = state.provider(&Credentials::from_env()?);
        Some(test_provider_connection(&provider).await.map_err(|e| e.to_string()))
    } else {
        None
    };

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "memory": {
                "users_with_memories": stats.users_with_memories,
                "user_memories": stats.user_memories,
                "knowledge_entries": stats.knowledge_entries,
                "posts_observed": stats.posts_observed,
                "summaries": stats.summaries,
            },
            "interactions": {
                "handled": handled,
                "failed": failed,
            },
            "stopped_threads": stopped_threads,
            "directives": directives,
            "blocklist_terms": state.blocklist.len(),
            "model": config.model,
            "model_reachable": model_check.as_ref().map(|r| r.is_ok()),
            "admins": config.admin_dids.len(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} Aura v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Memory ──").dim());
    println!("  Users:       {}", style(stats.users_with_memories).bold());
    println!("  User facts:  {}", stats.user_memories);
    println!("  Knowledge:   {}", stats.knowledge_entries);
    println!("  Posts seen:  {}", stats.posts_observed);
    println!("  Summaries:   {}", stats.summaries);
    println!();

    println!("  {}", style("── Interactions ──").dim());
    println!("  Handled:         {}", style(handled).green());
    if failed > 0 {
        println!("  Failed:          {}", style(failed).red());
    }
    println!("  Stopped threads: {}", stopped_threads);
    println!("  Directives:      {}", directives);
    println!();

    println!("  {}", style("── Agent ──").dim());
    println!("  Name:      {}", style(&config.bot_name).cyan());
    println!("  Model:     {}", config.model);
    match &model_check {
        Some(Ok(())) => println!("  Reachable: {}", style("yes").green()),
        Some(Err(e)) => println!("  Reachable: {} ({e})", style("no").red()),
        None => {}
    }
    println!("  Admins:    {}", config.admin_dids.len());
    println!("  Blocklist: {} terms", state.blocklist.len());
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!();

    Ok(())
}
