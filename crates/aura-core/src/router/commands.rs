//! Deterministic command and request detection.
//!
//! Admin commands and explicit write-post requests are recognized from the
//! post text itself. The model never decides on its own that the agent may
//! create top-level content.

use std::sync::LazyLock;

use regex::Regex;

static WRITE_REQUEST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:write|make|create|compose|draft)\s+(?:me\s+)?(?:a\s+|an\s+)?(?:new\s+|short\s+|long\s+)?(?:post|thread)\s+(?:about|on)\b",
    )
    .expect("invalid write request regex")
});

/// An explicit `@bot <command> <argument>` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Write a new top-level thread about a topic.
    Post { topic: String },
    /// Append a standing instruction to the directive log.
    Directive { instruction: String },
}

impl AdminCommand {
    pub fn name(&self) -> &'static str {
        match self {
            AdminCommand::Post { .. } => "post",
            AdminCommand::Directive { .. } => "directive",
        }
    }
}

/// Parse `@<bot_handle> post <topic>` or `@<bot_handle> directive <text>`.
///
/// The mention must open the post. Returns `None` for anything else,
/// including a command with no argument.
pub fn parse_admin_command(text: &str, bot_handle: &str) -> Option<AdminCommand> {
    let mention = format!("@{bot_handle}");
    let trimmed = text.trim_start();
    let head = trimmed.get(..mention.len())?;
    if !head.eq_ignore_ascii_case(&mention) {
        return None;
    }
    let rest = trimmed[mention.len()..].trim_start();
    let (word, argument) = rest.split_once(char::is_whitespace)?;
    let argument = argument.trim().trim_start_matches(':').trim();
    if argument.is_empty() {
        return None;
    }

    match word.trim_end_matches(':').to_lowercase().as_str() {
        "post" => {
            let topic = strip_prefix_ignore_case(argument, "about ").unwrap_or(argument).trim();
            (!topic.is_empty()).then(|| AdminCommand::Post {
                topic: topic.to_string(),
            })
        }
        "directive" => Some(AdminCommand::Directive {
            instruction: argument.to_string(),
        }),
        _ => None,
    }
}

/// Whether the text explicitly asks for a new post or thread.
pub fn is_write_request(text: &str) -> bool {
    WRITE_REQUEST_PATTERN.is_match(text)
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}
