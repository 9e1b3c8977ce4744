//! Post-interaction fact extraction via LLM.
//!
//! `FactExtractor` asks the model which facts from a finished exchange are
//! worth remembering. It only parses; filtering (ownership, length,
//! duplicates, blocklist) happens in [`super::service::MemoryService`].
//!
//! Unparseable output logs a warning and yields no facts: a failed
//! extraction must never undo a reply that was already published.

use serde::Deserialize;

use aura_types::llm::LlmError;
use aura_types::memory::{GeneralKnowledge, NewKnowledge, parse_tags};

use crate::llm::client::{ModelClient, ModelRole};

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are the memory of a social media bot. Read a short exchange and extract only NEW, durable information worth remembering.

Two kinds of items:
- "user": a stable fact about the person the bot is talking to (preference, name, location, profession). Use a short lowercase key.
- "general": an interesting or educational fact, definition, or explanation that is not personal.

Rules:
1. Skip greetings, opinions, jokes, and anything already listed under EXISTING KNOWLEDGE
2. Each value or content must be a single self-contained sentence
3. Never record facts about anyone other than the author of the message

Return a JSON array. Each element has exactly these fields:
- "scope": "user" or "general"
- for "user": "handle" (the author's handle), "key" and "value"
- for "general": "topic", "content", and "tags" (comma-separated string)

If there is nothing worth remembering, return an empty array: []"#;

/// Raw item as returned by the model.
#[derive(Debug, Deserialize)]
struct RawFact {
    scope: String,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tags: Option<String>,
}

/// A fact the model flagged, before any policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedFact {
    /// `handle` is the subject the model attributed the fact to, if it named one.
    User {
        handle: Option<String>,
        key: String,
        value: String,
    },
    General(NewKnowledge),
}

pub struct FactExtractor;

impl FactExtractor {
    #[tracing::instrument(
        name = "extract_facts",
        skip(client, exchange, existing),
        fields(existing = existing.len())
    )]
    pub async fn extract(
        client: &ModelClient,
        exchange: &str,
        existing: &[GeneralKnowledge],
    ) -> Result<Vec<ExtractedFact>, LlmError> {
        if exchange.trim().is_empty() {
            return Ok(Vec::new());
        }

        let existing_text = if existing.is_empty() {
            "(none)".to_string()
        } else {
            existing
                .iter()
                .map(|k| format!("- {}", k.content))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let prompt = format!("EXCHANGE:\n{exchange}\n\nEXISTING KNOWLEDGE:\n{existing_text}");

        let raw = client
            .invoke(ModelRole::Extraction, EXTRACTION_SYSTEM_PROMPT, &prompt)
            .await?;
        Ok(parse_facts(&raw))
    }
}

/// Parse the model's JSON array, tolerating prose around it.
pub fn parse_facts(raw: &str) -> Vec<ExtractedFact> {
    let json = match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            tracing::warn!(
                content_preview = %raw.chars().take(200).collect::<String>(),
                "No JSON array in extraction output"
            );
            return Vec::new();
        }
    };

    let items: Vec<RawFact> = match serde_json::from_str(json) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse extraction JSON; returning empty result");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match item.scope.trim().to_lowercase().as_str() {
            "user" => {
                let key = item.key?.trim().to_string();
                let value = item.value?.trim().to_string();
                let handle = item
                    .handle
                    .map(|h| h.trim().trim_start_matches('@').to_string())
                    .filter(|h| !h.is_empty());
                (!key.is_empty() && !value.is_empty())
                    .then_some(ExtractedFact::User { handle, key, value })
            }
            "general" => {
                let topic = item.topic?.trim().to_string();
                let content = item.content?.trim().to_string();
                (!topic.is_empty() && !content.is_empty()).then(|| {
                    ExtractedFact::General(NewKnowledge {
                        topic,
                        tags: parse_tags(item.tags.as_deref().unwrap_or_default()),
                        content,
                    })
                })
            }
            other => {
                tracing::warn!(scope = other, "Unknown fact scope from model; skipping");
                None
            }
        })
        .collect()
}
