//! Content pipeline: the second model call and everything after it.
//!
//! Generates the reply or post text from a [`ContextBlock`], screens it
//! against the blocklist, splits it into numbered thread segments, attaches
//! facets and publishes the segments in order.

pub mod blocklist;
pub mod facets;
pub mod safety;
pub mod splitter;

use std::time::Duration;

use aura_types::action::Action;
use aura_types::error::AgentError;
use aura_types::social::{Facet, PostRef, ReplyTarget};

use self::blocklist::Blocklist;
use self::facets::detect_facets;
use self::safety::SafetyCheck;
use self::splitter::split_into_segments;
use crate::context::block::ContextBlock;
use crate::llm::client::{ModelClient, ModelRole};
use crate::retry::RetryPolicy;
use crate::social::SocialClient;

const REPLY_STYLE: &str = "\
You are replying to someone on Bluesky.
- You CAN use emojis to convey tone and express personality.
- Continue the conversation naturally. Be concise and keep replies to a single \
post unless the user asks for a detailed explanation.
- Never use markdown. Write like a regular social media user.
- If RECENT BLUESKY POSTS are provided, you MUST use them to answer. Synthesize \
the information and include links.
- If the search found nothing, say you couldn't find information on that topic.
- Otherwise use your memory and the conversation history to respond naturally.
Reply with the post text only.";

const POST_STYLE: &str = "\
You are writing a new, original top-level Bluesky thread about a topic.
- Write an engaging, informative and neutral thread about the requested topic.
- Use the RECENT BLUESKY POSTS, if any, to understand what people are saying.
- Start with an introduction, give details in the middle and end with a conclusion.
- You can use multiple paragraphs. The text is split into a thread automatically.
- NEVER use emojis. Use plain text only.
- Never use markdown.
Reply with the thread text only.";

/// One post-sized piece of generated text, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub facets: Vec<Facet>,
}

/// What was published for one piece of content.
#[derive(Debug, Clone)]
pub struct PublishedContent {
    pub text: String,
    /// References of the published segments, in thread order.
    pub posts: Vec<PostRef>,
}

pub struct ContentPipeline {
    client: ModelClient,
    blocklist: Blocklist,
    bot_name: String,
    post_max_length: usize,
    segment_delay: Duration,
    retry: RetryPolicy,
}

impl ContentPipeline {
    pub fn new(
        client: ModelClient,
        blocklist: Blocklist,
        bot_name: impl Into<String>,
        post_max_length: usize,
        segment_delay: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            blocklist,
            bot_name: bot_name.into(),
            post_max_length,
            segment_delay,
            retry,
        }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Generate text for `action` from the assembled context.
    ///
    /// A draft containing a blocked term is regenerated once with an
    /// instruction to avoid it; a second blocked draft is an error.
    #[tracing::instrument(name = "generate_content", skip(self, context), fields(action = %action))]
    pub async fn generate(
        &self,
        context: &ContextBlock,
        action: Action,
        topic: Option<&str>,
    ) -> Result<String, AgentError> {
        let style = match action {
            Action::WritePost => POST_STYLE,
            Action::Reply | Action::BlueskySearch => REPLY_STYLE,
        };
        let mut prompt = context.render();
        match (action, topic) {
            (Action::WritePost, Some(topic)) => {
                prompt.push_str(&format!("\n\nTOPIC TO WRITE ABOUT:\n{topic}\n\nWrite the full text of the thread."));
            }
            _ => prompt.push_str("\n\nGenerate a natural, helpful response based on all available information."),
        }

        let draft = self.client.invoke(ModelRole::Content, style, &prompt).await?;
        let Some(term) = self.blocklist.find(&draft).map(str::to_string) else {
            return Ok(draft);
        };

        tracing::warn!(term = %term, "Draft contains a blocked term; regenerating once");
        prompt.push_str(&format!(
            "\n\nIMPORTANT: do not use the word \"{term}\" or anything close to it."
        ));
        let retry = self.client.invoke(ModelRole::Content, style, &prompt).await?;
        match self.blocklist.find(&retry) {
            None => Ok(retry),
            Some(term) => {
                tracing::warn!(term, "Regenerated draft still blocked; dropping");
                Err(AgentError::BlocklistViolation { term: term.to_string() })
            }
        }
    }

    /// Reject text containing a blocked term.
    pub fn screen(&self, text: &str) -> Result<(), AgentError> {
        match self.blocklist.find(text) {
            Some(term) => {
                tracing::warn!(term, "Text contains a blocked term");
                Err(AgentError::BlocklistViolation { term: term.to_string() })
            }
            None => Ok(()),
        }
    }

    /// Split `text` into numbered segments and attach facets to each.
    pub fn segment(&self, text: &str) -> Vec<Segment> {
        split_into_segments(text, self.post_max_length)
            .into_iter()
            .map(|text| Segment {
                facets: detect_facets(&text),
                text,
            })
            .collect()
    }

    /// Publish `segments` as one thread.
    ///
    /// The first segment replies to `reply_to` (or starts a new thread when
    /// it is `None`); each later segment replies to the previous one under
    /// the same root. A failure after the first segment is reported as
    /// [`AgentError::PartialThreadPublish`].
    #[tracing::instrument(name = "publish_thread", skip_all, fields(segments = segments.len()))]
    pub async fn publish<S: SocialClient>(
        &self,
        social: &S,
        reply_to: Option<&ReplyTarget>,
        segments: &[Segment],
    ) -> Result<Vec<PostRef>, AgentError> {
        let total = segments.len();
        let mut published: Vec<PostRef> = Vec::with_capacity(total);
        let mut target = reply_to.cloned();

        for (i, segment) in segments.iter().enumerate() {
            if i > 0 && !self.segment_delay.is_zero() {
                tokio::time::sleep(self.segment_delay).await;
            }
            let result = self
                .retry
                .run("social:publish", || social.publish(target.as_ref(), &segment.text, &segment.facets))
                .await;
            let post = match result {
                Ok(post) => post,
                Err(e) if published.is_empty() => return Err(AgentError::SocialCall(e)),
                Err(e) => {
                    tracing::error!(published = published.len(), total, error = %e, "Thread publish interrupted");
                    return Err(AgentError::PartialThreadPublish {
                        published: published.len(),
                        total,
                        source: e,
                    });
                }
            };

            let root = match &target {
                Some(t) => t.root.clone(),
                None => post.clone(),
            };
            target = Some(ReplyTarget {
                root,
                parent: post.clone(),
            });
            published.push(post);
        }

        tracing::info!(total, "Thread published");
        Ok(published)
    }

    /// Generate content for `action` and publish it as a reply to `reply_to`.
    pub async fn generate_and_publish<S: SocialClient>(
        &self,
        social: &S,
        context: &ContextBlock,
        action: Action,
        reply_to: &ReplyTarget,
    ) -> Result<PublishedContent, AgentError> {
        let text = self.generate(context, action, None).await?;
        let segments = self.segment(&text);
        let posts = self.publish(social, Some(reply_to), &segments).await?;
        Ok(PublishedContent { text, posts })
    }

    /// Screen a requested post topic: the blocklist first, then the model
    /// safety check. Runs before any context is built for the post.
    pub async fn check_topic(&self, topic: &str) -> Result<(), AgentError> {
        self.screen(topic)?;
        if !SafetyCheck::is_topic_safe(&self.client, topic).await? {
            return Err(AgentError::SafetyCheckFailed {
                topic: topic.to_string(),
            });
        }
        Ok(())
    }

    /// Write a new top-level thread about a topic that passed
    /// [`check_topic`](Self::check_topic).
    #[tracing::instrument(name = "write_post", skip(self, social, context))]
    pub async fn write_post<S: SocialClient>(
        &self,
        social: &S,
        context: &ContextBlock,
        topic: &str,
    ) -> Result<PublishedContent, AgentError> {
        let text = self.generate(context, Action::WritePost, Some(topic)).await?;
        let segments = self.segment(&text);
        let posts = self.publish(social, None, &segments).await?;
        Ok(PublishedContent { text, posts })
    }

    /// Publish fixed text (confirmations, refusals) as a reply.
    ///
    /// Notices may echo user text, so they are screened like generated text.
    pub async fn send_notice<S: SocialClient>(
        &self,
        social: &S,
        reply_to: &ReplyTarget,
        text: &str,
    ) -> Result<Vec<PostRef>, AgentError> {
        self.screen(text)?;
        let segments = self.segment(text);
        self.publish(social, Some(reply_to), &segments).await
    }
}
