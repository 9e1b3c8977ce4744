//! Router output types.

use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::memory::MemoryRef;

/// What the agent does with an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Normal conversational reply.
    Reply,
    /// Reply informed by a live search of the social network.
    BlueskySearch,
    /// Create a new top-level thread. Gated: never chosen by the model alone.
    WritePost,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Reply => write!(f, "reply"),
            Action::BlueskySearch => write!(f, "bluesky_search"),
            Action::WritePost => write!(f, "write_post"),
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reply" => Ok(Action::Reply),
            "bluesky_search" | "search" => Ok(Action::BlueskySearch),
            "write_post" => Ok(Action::WritePost),
            other => Err(format!("invalid action: '{other}'")),
        }
    }
}

/// Typed result of the first model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterDecision {
    pub action: Action,
    /// Search query or post topic, when the action needs one.
    pub query: Option<String>,
    pub memory_refs: BTreeSet<MemoryRef>,
}

impl RouterDecision {
    /// The fail-closed decision: reply, no query, no memory.
    pub fn fallback() -> Self {
        Self {
            action: Action::Reply,
            query: None,
            memory_refs: BTreeSet::new(),
        }
    }

    /// Handles referenced by this decision.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.memory_refs.iter().filter_map(|r| match r {
            MemoryRef::User(h) => Some(h.as_str()),
            _ => None,
        })
    }

    /// Topics and tags referenced by this decision.
    pub fn knowledge_terms(&self) -> Vec<String> {
        self.memory_refs
            .iter()
            .filter_map(|r| match r {
                MemoryRef::Topic(t) | MemoryRef::Tag(t) => Some(t.clone()),
                MemoryRef::User(_) => None,
            })
            .collect()
    }
}
