//! Action routing: the first model call.
//!
//! `ActionRouter::classify` turns an interaction into a typed
//! [`RouterDecision`]. Unparseable output falls back to a plain reply, and a
//! `write_post` label only survives when the post text itself asks for one.

pub mod commands;
pub mod parser;

use aura_types::action::{Action, RouterDecision};
use aura_types::llm::LlmError;
use aura_types::memory::MemoryCatalogue;

use crate::llm::client::{ModelClient, ModelRole};

use self::commands::is_write_request;
use self::parser::parse_decision;

const ROUTER_SYSTEM_PROMPT: &str = r#"You are the decision-making router for a social media bot. Analyze the most recent message in context.

1. Choose exactly one action:
   - "reply": normal conversation.
   - "bluesky_search": the user explicitly asks to find posts, or asks what people are saying about something.
   - "write_post": the user explicitly asks you to write a post or thread about something.
2. Pick the memory blocks (users, topics, tags) relevant to the conversation, only from the AVAILABLE MEMORY BLOCKS.
3. For bluesky_search or write_post, give a concise query or topic.

Your entire output MUST be a single JSON object, with no explanation:
{"action": "reply|bluesky_search|write_post", "query": "query_or_topic_or_null", "relevant_users": [], "relevant_topics": [], "relevant_tags": []}"#;

/// Catalogue entries shown per list.
const MAX_USERS_SHOWN: usize = 20;
const MAX_TOPICS_SHOWN: usize = 30;
const MAX_TAGS_SHOWN: usize = 30;

pub struct ActionRouter {
    client: ModelClient,
}

impl ActionRouter {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    /// Classify the latest message of a thread.
    ///
    /// Only a failed model call is an error. An answer that cannot be parsed
    /// is logged and becomes [`RouterDecision::fallback`].
    #[tracing::instrument(name = "route_interaction", skip_all, fields(is_admin = is_admin))]
    pub async fn classify(
        &self,
        thread_history: &str,
        interaction_text: &str,
        is_admin: bool,
        catalogue: &MemoryCatalogue,
    ) -> Result<RouterDecision, LlmError> {
        let prompt = build_prompt(thread_history, interaction_text, is_admin, catalogue);
        let raw = self
            .client
            .invoke(ModelRole::Router, ROUTER_SYSTEM_PROMPT, &prompt)
            .await?;

        let decision = match parse_decision(&raw) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    raw = %raw.chars().take(200).collect::<String>(),
                    "Router output unusable; falling back to reply"
                );
                RouterDecision::fallback()
            }
        };

        let decision = gate(decision, interaction_text);
        tracing::info!(action = %decision.action, refs = decision.memory_refs.len(), "Routed interaction");
        Ok(decision)
    }
}

/// Enforce that `write_post` is authorized by the text, not the model, and
/// that it carries a topic.
fn gate(mut decision: RouterDecision, interaction_text: &str) -> RouterDecision {
    if decision.action == Action::WritePost
        && (!is_write_request(interaction_text) || decision.query.is_none())
    {
        tracing::info!("Model proposed write_post without an explicit request; downgrading to reply");
        decision.action = Action::Reply;
    }
    if decision.action == Action::BlueskySearch && decision.query.is_none() {
        tracing::info!("Search proposed without a query; downgrading to reply");
        decision.action = Action::Reply;
    }
    decision
}

fn build_prompt(
    thread_history: &str,
    interaction_text: &str,
    is_admin: bool,
    catalogue: &MemoryCatalogue,
) -> String {
    let list = |items: &[String], max: usize| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.iter().take(max).cloned().collect::<Vec<_>>().join(", ")
        }
    };
    format!(
        "CONVERSATION HISTORY:\n{thread_history}\n\n\
         MOST RECENT MESSAGE:\n{interaction_text}\n\n\
         AUTHOR IS ADMIN: {}\n\n\
         AVAILABLE MEMORY BLOCKS:\n\
         - User handles with memories: {}\n\
         - Recent participants: {}\n\
         - Knowledge topics: {}\n\
         - Available tags: {}",
        if is_admin { "yes" } else { "no" },
        list(&catalogue.user_handles, MAX_USERS_SHOWN),
        list(&catalogue.recent_participants, MAX_USERS_SHOWN),
        list(&catalogue.knowledge_topics, MAX_TOPICS_SHOWN),
        list(&catalogue.tags, MAX_TAGS_SHOWN),
    )
}
