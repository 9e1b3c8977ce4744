//! Subject summaries for compact prompt context.
//!
//! `SubjectSummarizer` condenses a user's recent posts, or the knowledge
//! filed under a topic, into a short paragraph cached in the store.

use aura_types::llm::LlmError;
use aura_types::memory::{GeneralKnowledge, PostHistory, SubjectKey};

use crate::llm::client::{ModelClient, ModelRole};

const SUMMARY_SYSTEM_PROMPT: &str = r#"You keep short notes for a social media bot. Summarize the material you are given in at most 100 words. Plain text, no markdown, no preamble.

For a person include: main interests and topics, important personal info they shared, and their conversation style.
For a topic include: the key facts and any open questions."#;

/// Characters of each post fed to the summarizer.
const POST_EXCERPT_CHARS: usize = 100;

pub struct SubjectSummarizer;

impl SubjectSummarizer {
    /// Summarize from already-loaded material. Returns `None` when there is
    /// nothing to summarize.
    #[tracing::instrument(
        name = "summarize_subject",
        skip(client, posts, knowledge),
        fields(subject = %subject, posts = posts.len(), knowledge = knowledge.len())
    )]
    pub async fn summarize(
        client: &ModelClient,
        subject: &SubjectKey,
        posts: &[PostHistory],
        knowledge: &[GeneralKnowledge],
    ) -> Result<Option<String>, LlmError> {
        let material = build_material(posts, knowledge);
        if material.is_empty() {
            return Ok(None);
        }

        let heading = match subject {
            SubjectKey::User(handle) => format!("Summarize key info about @{handle} from recent posts:"),
            SubjectKey::Topic(topic) => format!("Summarize what is known about \"{topic}\":"),
        };
        let prompt = format!("{heading}\n\n{material}");
        let summary = client
            .invoke(ModelRole::Summary, SUMMARY_SYSTEM_PROMPT, &prompt)
            .await?;
        Ok(Some(summary))
    }
}

fn build_material(posts: &[PostHistory], knowledge: &[GeneralKnowledge]) -> String {
    let mut lines = Vec::with_capacity(posts.len() + knowledge.len());
    for post in posts {
        let excerpt: String = post.text.chars().take(POST_EXCERPT_CHARS).collect();
        if excerpt.len() < post.text.len() {
            lines.push(format!("- {excerpt}..."));
        } else {
            lines.push(format!("- {excerpt}"));
        }
    }
    for k in knowledge {
        lines.push(format!("- {}: {}", k.topic, k.content));
    }
    lines.join("\n")
}
