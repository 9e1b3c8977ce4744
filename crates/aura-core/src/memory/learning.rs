//! Explicit learning requests ("remember: I like tea").
//!
//! Parsed without a model call. Every learned fact is scoped to the author
//! of the request, so only the author's own memory can change.

use std::sync::LazyLock;

use regex::Regex;

static REQUEST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:remember\s*:|remember\s+that|learn\s+that)\s*(.+)")
        .expect("invalid learning request regex")
});

static FAVORITE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^my\s+favou?rite\s+([a-z ]{1,30}?)\s+is\s+(.+)$")
        .expect("invalid favorite regex")
});

/// A user fact parsed from a learning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnedFact {
    pub key: String,
    pub value: String,
}

/// Parse a learning request out of a post, if it contains one.
pub fn parse_learning_request(text: &str) -> Option<LearnedFact> {
    let captures = REQUEST_PATTERN.captures(text)?;
    let statement = captures
        .get(1)?
        .as_str()
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim();
    if statement.is_empty() {
        return None;
    }
    Some(classify_statement(statement))
}

fn classify_statement(statement: &str) -> LearnedFact {
    let starts = |prefix: &str| {
        statement
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    };
    let rest = |prefix: &str| statement[prefix.len()..].trim().to_string();

    if let Some(c) = FAVORITE_PATTERN.captures(statement) {
        let subject = c[1].trim().to_lowercase().replace(' ', "_");
        return fact(&format!("favorite_{subject}"), c[2].trim());
    }
    for (prefix, verb) in [("i like ", "likes"), ("i love ", "loves"), ("i enjoy ", "enjoys")] {
        if starts(prefix) {
            return fact("preference", &format!("{verb} {}", rest(prefix)));
        }
    }
    for prefix in ["i don't like ", "i dislike ", "i hate "] {
        if starts(prefix) {
            return fact("dislike", &format!("dislikes {}", rest(prefix)));
        }
    }
    for prefix in ["my name is ", "call me "] {
        if starts(prefix) {
            return fact("name", &rest(prefix));
        }
    }
    for prefix in ["i live in ", "i'm from ", "i am from "] {
        if starts(prefix) {
            return fact("location", &rest(prefix));
        }
    }
    for prefix in ["i am ", "i'm "] {
        if starts(prefix) {
            return fact("about", &format!("is {}", rest(prefix)));
        }
    }
    fact("note", statement)
}

fn fact(key: &str, value: &str) -> LearnedFact {
    LearnedFact {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(text: &str) -> (String, String) {
        let f = parse_learning_request(text).unwrap();
        (f.key, f.value)
    }

    #[test]
    fn test_preference() {
        assert_eq!(
            parsed("@aura.test remember: I like tea"),
            ("preference".into(), "likes tea".into())
        );
        assert_eq!(
            parsed("remember that I love long walks!"),
            ("preference".into(), "loves long walks".into())
        );
    }

    #[test]
    fn test_identity_facts() {
        assert_eq!(parsed("Remember: my name is Sam."), ("name".into(), "Sam".into()));
        assert_eq!(parsed("learn that I'm a pilot"), ("about".into(), "is a pilot".into()));
        assert_eq!(parsed("remember: I live in Oslo"), ("location".into(), "Oslo".into()));
        assert_eq!(
            parsed("remember that my favorite color is green"),
            ("favorite_color".into(), "green".into())
        );
    }

    #[test]
    fn test_fallback_note() {
        assert_eq!(
            parsed("remember that the meetup moved to Friday"),
            ("note".into(), "the meetup moved to Friday".into())
        );
    }

    #[test]
    fn test_no_request() {
        assert!(parse_learning_request("do you remember me?").is_none());
        assert!(parse_learning_request("remember:   ").is_none());
        assert!(parse_learning_request("what's the weather").is_none());
    }
}
