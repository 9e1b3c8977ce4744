//! Role-aware model client used by every decision stage.
//!
//! Wraps a [`BoxLlmProvider`] with the configured model id and the retry
//! policy, and maps each [`ModelRole`] to its sampling parameters.

use std::fmt;
use std::sync::Arc;

use tracing::{Instrument, info_span};

use aura_types::llm::{CompletionRequest, LlmError, Message, MessageRole};

use super::box_provider::BoxLlmProvider;
use crate::retry::RetryPolicy;

/// Which stage is calling the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    /// Action classification (first call).
    Router,
    /// Reply or post generation (second call).
    Content,
    /// Yes/no appropriateness check for a post topic.
    Safety,
    /// Post-publish fact extraction.
    Extraction,
    /// Subject summary regeneration.
    Summary,
}

impl ModelRole {
    pub fn max_tokens(&self) -> u32 {
        match self {
            ModelRole::Router => 512,
            ModelRole::Content => 1024,
            ModelRole::Safety => 16,
            ModelRole::Extraction => 1024,
            ModelRole::Summary => 512,
        }
    }

    /// Deterministic for classification stages, warmer for prose.
    pub fn temperature(&self) -> f64 {
        match self {
            ModelRole::Router | ModelRole::Safety | ModelRole::Extraction => 0.0,
            ModelRole::Summary => 0.3,
            ModelRole::Content => 0.8,
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Router => write!(f, "router"),
            ModelRole::Content => write!(f, "content"),
            ModelRole::Safety => write!(f, "safety"),
            ModelRole::Extraction => write!(f, "extraction"),
            ModelRole::Summary => write!(f, "summary"),
        }
    }
}

#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<BoxLlmProvider>,
    model: String,
    retry: RetryPolicy,
}

impl ModelClient {
    pub fn new(provider: Arc<BoxLlmProvider>, model: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            model: model.into(),
            retry,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send `prompt` under `system` instructions and return the trimmed text.
    ///
    /// An empty completion is reported as [`LlmError::EmptyResponse`] so the
    /// retry policy treats it like any other malformed response.
    pub async fn invoke(&self, role: ModelRole, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: MessageRole::User,
                content: prompt.to_string(),
            }],
            system: Some(system.to_string()),
            max_tokens: role.max_tokens(),
            temperature: Some(role.temperature()),
        };

        let span = info_span!(
            "gen_ai.complete",
            gen_ai.operation.name = %role,
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
        );

        let op_name = format!("model:{role}");
        self.retry
            .run(&op_name, || async {
                let response = self.provider.complete(&request).await?;
                let content = response.content.trim();
                if content.is_empty() {
                    return Err(LlmError::EmptyResponse);
                }
                tracing::debug!(
                    role = %role,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Model call completed"
                );
                Ok(content.to_string())
            })
            .instrument(span)
            .await
    }
}
