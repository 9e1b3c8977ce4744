//! Stop-intent detection.
//!
//! Runs before any model call, so it is purely lexical: a fixed phrase list
//! matched on word boundaries, case-insensitively.

use std::sync::LazyLock;

use regex::Regex;

static STOP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:",
        r"stop",
        r"|go\s+away",
        r"|end\s+(?:the\s+)?conversation",
        r"|shut\s+up",
        r"|enough",
        r"|leave\s+me\s+alone",
        r")\b",
    ))
    .expect("invalid stop pattern regex")
});

/// Whether the author is asking the agent to leave the thread.
pub fn is_stop_request(text: &str) -> bool {
    STOP_PATTERN.is_match(text)
}
