//! Memory types for Aura.
//!
//! These types model the agent's durable memory: per-user facts, general
//! knowledge the agent extracted itself, the append-only post history, and
//! the derived per-subject summaries that keep prompt context small.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Normalize a user-memory key: keys are case-insensitive short labels.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// A single fact about a user, owned by that user's handle.
///
/// `(user_handle, key)` is unique; writing an existing key replaces the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMemory {
    pub user_handle: String,
    /// Lowercased label, e.g. "preference" or "name".
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// A fact the agent learned from a conversation, not scoped to any user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralKnowledge {
    pub id: i64,
    pub topic: String,
    pub tags: BTreeSet<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A new general-knowledge row before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKnowledge {
    pub topic: String,
    pub tags: BTreeSet<String>,
    pub content: String,
}

/// One observed post that mentioned the agent. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostHistory {
    pub post_uri: String,
    pub thread_root_uri: String,
    pub author_handle: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// What a summary is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SubjectKey {
    User(String),
    Topic(String),
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKey::User(handle) => write!(f, "user:{handle}"),
            SubjectKey::Topic(topic) => write!(f, "topic:{topic}"),
        }
    }
}

impl FromStr for SubjectKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("user", handle)) if !handle.is_empty() => Ok(SubjectKey::User(handle.to_string())),
            Some(("topic", topic)) if !topic.is_empty() => Ok(SubjectKey::Topic(topic.to_string())),
            _ => Err(format!("invalid subject key: '{s}'")),
        }
    }
}

/// Compressed view of a subject's history. An eventually-consistent cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizedKnowledge {
    pub subject_key: SubjectKey,
    pub summary_text: String,
    pub generated_at: DateTime<Utc>,
}

/// One entry of the admin directive log. Later entries win on conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub id: i64,
    pub instruction: String,
    pub author_did: String,
    pub created_at: DateTime<Utc>,
}

/// A memory block the router says is relevant to an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MemoryRef {
    User(String),
    Topic(String),
    Tag(String),
}

/// Names of the memory blocks that exist, shown to the router.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCatalogue {
    pub user_handles: Vec<String>,
    pub knowledge_topics: Vec<String>,
    pub tags: Vec<String>,
    pub recent_participants: Vec<String>,
}

/// Everything one interaction writes back to memory, applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryWriteBack {
    /// Owner handle of every user fact in this batch.
    pub owner_handle: String,
    /// `(key, value)` pairs for the owner.
    pub user_facts: Vec<(String, String)>,
    pub knowledge: Vec<NewKnowledge>,
}

impl MemoryWriteBack {
    pub fn new(owner_handle: impl Into<String>) -> Self {
        Self {
            owner_handle: owner_handle.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user_facts.is_empty() && self.knowledge.is_empty()
    }
}

/// Split a comma-separated tag string into a normalized set.
pub fn parse_tags(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|t| t.trim().trim_matches(|c| c == '[' || c == ']').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Join a tag set back into the stored comma-separated form.
pub fn format_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().cloned().collect::<Vec<_>>().join(", ")
}
