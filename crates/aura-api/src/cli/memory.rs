//! Memory inspection commands. Read-only; no credentials needed.

use anyhow::{Result, anyhow};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use aura_core::repository::memory::MemoryRepository;
use aura_types::memory::{SubjectKey, format_tags};

use super::{MemoryCommand, normalize_handle};
use crate::state::AppState;

pub async fn dispatch(state: &AppState, action: MemoryCommand, json: bool) -> Result<()> {
    match action {
        MemoryCommand::User { handle } => show_user(state, &normalize_handle(&handle), json).await,
        MemoryCommand::Knowledge { terms, limit } => show_knowledge(state, &terms, limit, json).await,
        MemoryCommand::Summary { subject } => show_summary(state, &subject, json).await,
        MemoryCommand::Posts { handle, limit } => show_posts(state, &normalize_handle(&handle), limit, json).await,
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.iter().map(|h| Cell::new(h).fg(Color::White)).collect::<Vec<_>>());
    table
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn print_empty(message: &str) {
    println!();
    println!("  {} {message}", style("i").blue().bold());
    println!();
}

async fn show_user(state: &AppState, handle: &str, json: bool) -> Result<()> {
    let memories = state.memory_repo().get_user_memory(handle).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&memories)?);
        return Ok(());
    }
    if memories.is_empty() {
        print_empty(&format!("No memories stored for @{handle}."));
        return Ok(());
    }

    let mut table = new_table(&["Key", "Value", "Updated"]);
    for memory in &memories {
        table.add_row(vec![
            Cell::new(&memory.key).fg(Color::Cyan),
            Cell::new(truncate(&memory.value, 80)).fg(Color::White),
            Cell::new(memory.updated_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("  Memories for {}", style(format!("@{handle}")).cyan().bold());
    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn show_knowledge(state: &AppState, terms: &[String], limit: i64, json: bool) -> Result<()> {
    let repo = state.memory_repo();
    let items = if terms.is_empty() {
        repo.recent_knowledge(limit).await?
    } else {
        repo.query_general_knowledge(terms, limit).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        print_empty("No matching knowledge. Knowledge is learned from conversations.");
        return Ok(());
    }

    let mut table = new_table(&["Topic", "Content", "Tags", "Learned"]);
    for item in &items {
        table.add_row(vec![
            Cell::new(&item.topic).fg(Color::Cyan),
            Cell::new(truncate(&item.content, 70)).fg(Color::White),
            Cell::new(format_tags(&item.tags)).fg(Color::Magenta),
            Cell::new(item.created_at.format("%Y-%m-%d").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {} entr{}", style(items.len()).bold(), if items.len() == 1 { "y" } else { "ies" });
    println!();
    Ok(())
}

async fn show_summary(state: &AppState, subject: &str, json: bool) -> Result<()> {
    let subject: SubjectKey = subject.parse().map_err(|e: String| anyhow!(e))?;
    let summary = state.memory_repo().get_summary(&subject).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    match summary {
        Some(summary) => {
            println!();
            println!(
                "  {} {}",
                style(&summary.subject_key).cyan().bold(),
                style(format!("(generated {})", summary.generated_at.format("%Y-%m-%d %H:%M"))).dim()
            );
            println!();
            println!("  {}", summary.summary_text);
            println!();
        }
        None => print_empty(&format!("No summary cached for {subject}. Run `aura summarize {subject}`.")),
    }
    Ok(())
}

async fn show_posts(state: &AppState, handle: &str, limit: i64, json: bool) -> Result<()> {
    let posts = state.memory_repo().posts_by_author(handle, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }
    if posts.is_empty() {
        print_empty(&format!("No posts observed from @{handle}."));
        return Ok(());
    }

    let mut table = new_table(&["When", "Text"]);
    for post in &posts {
        table.add_row(vec![
            Cell::new(post.timestamp.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
            Cell::new(truncate(&post.text, 90)).fg(Color::White),
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }
}
