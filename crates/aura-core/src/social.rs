//! SocialClient trait definition.
//!
//! The engine's only view of the social network. The Bluesky XRPC
//! implementation lives in aura-infra.

use aura_types::error::SocialError;
use aura_types::social::{Facet, Interaction, Post, PostRef, ReplyTarget};

/// The account the agent posts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub handle: String,
    pub did: String,
}

impl BotIdentity {
    /// Whether `text` addresses the bot directly with `@handle`.
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        let needle = format!("@{}", self.handle.to_lowercase());
        let haystack = text.to_lowercase();
        haystack.match_indices(&needle).any(|(idx, _)| {
            // Reject matches that continue into a longer handle.
            let mut rest = haystack[idx + needle.len()..].chars();
            match rest.next() {
                Some(c) if c.is_alphanumeric() || c == '-' || c == '_' => false,
                Some('.') => !rest.next().is_some_and(|c| c.is_alphanumeric()),
                _ => true,
            }
        })
    }
}

pub trait SocialClient: Send + Sync {
    /// Recent notifications, oldest first.
    fn fetch_notifications(
        &self,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Interaction>, SocialError>> + Send;

    /// Posts of a thread from root to the given post, in reading order.
    fn fetch_thread(
        &self,
        uri: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Post>, SocialError>> + Send;

    fn search(
        &self,
        term: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Post>, SocialError>> + Send;

    /// Publish one post, as a reply when `reply_to` is set.
    fn publish(
        &self,
        reply_to: Option<&ReplyTarget>,
        text: &str,
        facets: &[Facet],
    ) -> impl std::future::Future<Output = Result<PostRef, SocialError>> + Send;
}
