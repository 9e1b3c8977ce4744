//! Appropriateness check for new top-level post topics.

use crate::llm::client::{ModelClient, ModelRole};
use aura_types::llm::LlmError;

const SAFETY_SYSTEM_PROMPT: &str = "\
A user has asked a social media bot to write a new public post about a topic. \
Analyze the topic for sensitive, harmful, hateful or dangerous content. Banned \
categories include hate speech, violence, illegal acts, self-harm, explicit \
content and misinformation.

If the topic is safe and appropriate for a general social media audience, answer \
with only \"true\". If it is unsafe or inappropriate, answer with only \"false\".";

pub struct SafetyCheck;

impl SafetyCheck {
    /// Ask the model whether `topic` is fit to post about.
    ///
    /// Anything other than a clear "true" counts as unsafe.
    #[tracing::instrument(name = "safety_check", skip(client))]
    pub async fn is_topic_safe(client: &ModelClient, topic: &str) -> Result<bool, LlmError> {
        let answer = client
            .invoke(ModelRole::Safety, SAFETY_SYSTEM_PROMPT, &format!("Topic: \"{topic}\""))
            .await?;
        let safe = parse_verdict(&answer);
        tracing::info!(safe, answer = %answer, "Safety verdict");
        Ok(safe)
    }
}

fn parse_verdict(answer: &str) -> bool {
    answer
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .eq_ignore_ascii_case("true")
}
