//! Social-network data shapes consumed and produced by the engine.
//!
//! These mirror the subset of the Bluesky (AT Protocol) records the agent
//! needs: posts, strong references, notifications and rich-text facets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Strong reference to a record: URI plus content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

/// Where a reply attaches in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub root: PostRef,
    pub parent: PostRef,
}

/// A post as seen by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub uri: String,
    pub cid: String,
    pub author_handle: String,
    pub author_did: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Root of the thread this post replies into, if it is a reply.
    pub reply_root: Option<PostRef>,
}

impl Post {
    pub fn strong_ref(&self) -> PostRef {
        PostRef {
            uri: self.uri.clone(),
            cid: self.cid.clone(),
        }
    }

    /// Root of this post's thread (the post itself for top-level posts).
    pub fn root_ref(&self) -> PostRef {
        self.reply_root.clone().unwrap_or_else(|| self.strong_ref())
    }

    /// Reply target for answering this post within its thread.
    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget {
            root: self.root_ref(),
            parent: self.strong_ref(),
        }
    }

    /// Public web link for an `at://<did>/app.bsky.feed.post/<rkey>` URI.
    pub fn web_url(&self) -> Option<String> {
        web_url_for(&self.uri)
    }

    /// `@handle: text` line used in thread transcripts.
    pub fn transcript_line(&self) -> String {
        format!("@{}: {}", self.author_handle, self.text)
    }
}

/// Convert an AT URI of a post into its bsky.app URL.
pub fn web_url_for(uri: &str) -> Option<String> {
    let rest = uri.strip_prefix("at://")?;
    let parts: Vec<&str> = rest.split('/').collect();
    match parts.as_slice() {
        [did, _collection, rkey] if !did.is_empty() && !rkey.is_empty() => {
            Some(format!("https://bsky.app/profile/{did}/post/{rkey}"))
        }
        _ => None,
    }
}

/// Why a notification was delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationReason {
    Mention,
    Reply,
    Quote,
    Other(String),
}

impl NotificationReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "mention" => NotificationReason::Mention,
            "reply" => NotificationReason::Reply,
            "quote" => NotificationReason::Quote,
            other => NotificationReason::Other(other.to_string()),
        }
    }

    /// Only mentions and replies are interactions the agent evaluates.
    pub fn is_actionable(&self) -> bool {
        matches!(self, NotificationReason::Mention | NotificationReason::Reply)
    }
}

/// How an interaction reached the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionSource {
    Notification { reason: NotificationReason },
    SearchHit,
}

impl fmt::Display for InteractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionSource::Notification { reason } => write!(f, "notification:{reason:?}"),
            InteractionSource::SearchHit => write!(f, "search_hit"),
        }
    }
}

/// An inbound post requiring evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub post: Post,
    pub source: InteractionSource,
}

impl Interaction {
    pub fn uri(&self) -> &str {
        &self.post.uri
    }

    pub fn is_actionable(&self) -> bool {
        match &self.source {
            InteractionSource::Notification { reason } => reason.is_actionable(),
            InteractionSource::SearchHit => true,
        }
    }
}

/// Byte range of a facet within a post's UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

/// What a facet annotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FacetFeature {
    /// `@handle`; resolved to a DID by the client at publish time.
    Mention { handle: String },
    Link { uri: String },
}

/// Structured rich-text annotation over a span of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub feature: FacetFeature,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(uri: &str, root: Option<&str>) -> Post {
        Post {
            uri: uri.to_string(),
            cid: format!("cid-{uri}"),
            author_handle: "alice.test".to_string(),
            author_did: "did:plc:alice".to_string(),
            text: "hi".to_string(),
            created_at: None,
            reply_root: root.map(|r| PostRef {
                uri: r.to_string(),
                cid: format!("cid-{r}"),
            }),
        }
    }

    #[test]
    fn test_root_ref_top_level_is_self() {
        let p = post("at://did:plc:alice/app.bsky.feed.post/1", None);
        assert_eq!(p.root_ref().uri, p.uri);
    }

    #[test]
    fn test_reply_target_keeps_root() {
        let p = post(
            "at://did:plc:alice/app.bsky.feed.post/2",
            Some("at://did:plc:bob/app.bsky.feed.post/1"),
        );
        let target = p.reply_target();
        assert_eq!(target.root.uri, "at://did:plc:bob/app.bsky.feed.post/1");
        assert_eq!(target.parent.uri, p.uri);
    }

    #[test]
    fn test_web_url() {
        assert_eq!(
            web_url_for("at://did:plc:abc/app.bsky.feed.post/3kx").as_deref(),
            Some("https://bsky.app/profile/did:plc:abc/post/3kx")
        );
        assert_eq!(web_url_for("https://example.com"), None);
    }

    #[test]
    fn test_notification_reason() {
        assert!(NotificationReason::parse("mention").is_actionable());
        assert!(NotificationReason::parse("reply").is_actionable());
        assert!(!NotificationReason::parse("like").is_actionable());
    }
}
