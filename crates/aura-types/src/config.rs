//! Agent configuration types.
//!
//! `AgentConfig` represents the `config.toml` in the data directory. It is
//! read once at startup and handed to each component as an immutable value.
//! Every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;

/// Top-level configuration for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Display name used in prompts and transcripts.
    pub bot_name: String,
    /// Bluesky PDS / entryway the agent logs in to.
    pub service_url: String,
    /// Base personality text. Admin directives are layered on top of it.
    pub persona: String,
    /// DIDs allowed to issue `post` and `directive` commands.
    pub admin_dids: BTreeSet<String>,
    /// Consecutive non-mention interactions tolerated in one thread.
    pub streak_limit: u32,
    pub poll_interval_secs: u64,
    pub notification_fetch_limit: u32,
    /// Also poll a search for posts mentioning `search_term`.
    pub reply_to_search_mentions: bool,
    /// Search term for mention polling. Defaults to `@<handle>` when empty.
    pub search_term: String,
    pub search_limit: u32,
    /// Posts fetched for a `bluesky_search` action.
    pub search_result_limit: u32,
    pub max_context_chars: usize,
    pub post_max_length: usize,
    pub summary_interval_secs: u64,
    pub summary_max_age_secs: u64,
    /// Model identifier sent to the provider.
    pub model: String,
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    pub retry: RetryConfig,
    /// Poll cycles an interaction may fail before it is dropped for good.
    pub max_interaction_attempts: u32,
    /// Pause between publishing consecutive thread segments.
    pub segment_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bot_name: "Aura".to_string(),
            service_url: "https://bsky.social".to_string(),
            persona: default_persona(),
            admin_dids: BTreeSet::new(),
            streak_limit: 10,
            poll_interval_secs: 10,
            notification_fetch_limit: 30,
            reply_to_search_mentions: false,
            search_term: String::new(),
            search_limit: 20,
            search_result_limit: 5,
            max_context_chars: 15_000,
            post_max_length: 300,
            summary_interval_secs: 900,
            summary_max_age_secs: 86_400,
            model: "google/gemini-2.5-flash-lite".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            retry: RetryConfig::default(),
            max_interaction_attempts: 3,
            segment_delay_ms: 2_000,
        }
    }
}

impl AgentConfig {
    pub fn is_admin(&self, did: &str) -> bool {
        self.admin_dids.contains(did)
    }
}

fn default_persona() -> String {
    "You are a helpful and knowledgeable Bluesky bot. Be helpful, engaging, and \
     supportive. Never use markdown; write like a regular social media user."
        .to_string()
}

/// Bounded retry with exponential backoff for external calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}
