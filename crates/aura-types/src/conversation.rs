//! Per-thread conversation state.
//!
//! A thread is identified by its root post URI. The state tracks how many
//! times in a row the agent has been pulled into the thread without a fresh
//! direct mention, and whether the agent has permanently left the thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Reply-streak bookkeeping for a single thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_root_uri: String,
    pub streak_count: u32,
    /// Terminal: once set, the thread is never processed again.
    pub stopped: bool,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// A freshly tracked thread.
    pub fn new(thread_root_uri: impl Into<String>) -> Self {
        Self {
            thread_root_uri: thread_root_uri.into(),
            streak_count: 0,
            stopped: false,
            updated_at: Utc::now(),
        }
    }
}

/// Why the agent is leaving a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisengageReason {
    AlreadyStopped,
    StopRequested,
    StreakLimit,
}

impl fmt::Display for DisengageReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisengageReason::AlreadyStopped => write!(f, "already_stopped"),
            DisengageReason::StopRequested => write!(f, "stop_requested"),
            DisengageReason::StreakLimit => write!(f, "streak_limit"),
        }
    }
}

/// Outcome of evaluating an interaction against its thread's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Continue,
    Disengage(DisengageReason),
}

impl Verdict {
    pub fn is_continue(&self) -> bool {
        matches!(self, Verdict::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_active() {
        let state = ConversationState::new("at://did:plc:x/app.bsky.feed.post/1");
        assert_eq!(state.streak_count, 0);
        assert!(!state.stopped);
    }

    #[test]
    fn test_verdict_serde() {
        let json = serde_json::to_string(&Verdict::Disengage(DisengageReason::StreakLimit)).unwrap();
        assert_eq!(json, r#"{"verdict":"disengage","reason":"streak_limit"}"#);
        assert!(Verdict::Continue.is_continue());
    }
}
