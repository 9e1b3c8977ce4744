//! `aura summarize`: refresh summaries outside the monitoring loop.

use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::Utc;
use console::style;

use aura_types::memory::SubjectKey;

use crate::state::AppState;

/// Activity window and cap, matching the periodic pass of `aura run`.
const ACTIVE_WINDOW_HOURS: i64 = 24;
const MAX_USERS: i64 = 10;

pub async fn summarize(state: &AppState, subject: Option<String>, force: bool, json: bool) -> Result<()> {
    let service = state.memory_service()?;

    let Some(subject) = subject else {
        let since = Utc::now() - chrono::Duration::hours(ACTIVE_WINDOW_HOURS);
        let refreshed = service.refresh_active_users(since, MAX_USERS).await?;
        if json {
            println!("{}", serde_json::json!({ "refreshed": refreshed }));
        } else {
            println!();
            let noun = if refreshed == 1 { "summary" } else { "summaries" };
            println!("  {} Refreshed {} user {noun}", style("✓").green(), style(refreshed).bold());
            println!();
        }
        return Ok(());
    };

    let subject: SubjectKey = subject.parse().map_err(|e: String| anyhow!(e))?;
    let max_age = if force {
        Duration::ZERO
    } else {
        Duration::from_secs(state.config.summary_max_age_secs)
    };
    let summary = service.get_or_refresh_summary(&subject, max_age).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    match summary {
        Some(summary) => {
            println!("  {} {}", style("✓").green(), style(&summary.subject_key).cyan().bold());
            println!();
            println!("  {}", summary.summary_text);
        }
        None => println!("  {} Nothing to summarize for {subject}", style("i").blue().bold()),
    }
    println!();
    Ok(())
}
