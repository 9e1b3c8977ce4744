//! Strict parser for the router's JSON classification.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use aura_types::action::{Action, RouterDecision};
use aura_types::memory::MemoryRef;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("invalid json object regex"));

/// Why a classification could not be used. Never leaves the router: every
/// variant degrades to [`RouterDecision::fallback`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassificationAmbiguous {
    #[error("no JSON object in model output")]
    NoJson,

    #[error("malformed classification JSON: {0}")]
    Malformed(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    action: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    relevant_users: Vec<String>,
    #[serde(default)]
    relevant_topics: Vec<String>,
    #[serde(default)]
    relevant_tags: Vec<String>,
}

pub fn parse_decision(raw: &str) -> Result<RouterDecision, ClassificationAmbiguous> {
    let json = JSON_OBJECT
        .find(raw)
        .ok_or(ClassificationAmbiguous::NoJson)?
        .as_str();
    let decision: RawDecision =
        serde_json::from_str(json).map_err(|e| ClassificationAmbiguous::Malformed(e.to_string()))?;

    let action = match decision.action.as_deref().map(str::trim) {
        None | Some("") => Action::Reply,
        Some(label) => label
            .parse::<Action>()
            .map_err(|_| ClassificationAmbiguous::UnknownAction(label.to_string()))?,
    };

    let query = decision
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty() && !q.eq_ignore_ascii_case("null"));

    let mut memory_refs = BTreeSet::new();
    for user in decision.relevant_users {
        let handle = user.trim().trim_start_matches('@').to_lowercase();
        if !handle.is_empty() {
            memory_refs.insert(MemoryRef::User(handle));
        }
    }
    for topic in decision.relevant_topics {
        let topic = topic.trim().to_string();
        if !topic.is_empty() {
            memory_refs.insert(MemoryRef::Topic(topic));
        }
    }
    for tag in decision.relevant_tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() {
            memory_refs.insert(MemoryRef::Tag(tag));
        }
    }

    Ok(RouterDecision {
        action,
        query,
        memory_refs,
    })
}
