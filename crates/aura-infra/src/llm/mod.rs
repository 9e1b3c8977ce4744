//! LLM provider implementations.
//!
//! Contains the concrete [`LlmProvider`](aura_core::llm::provider::LlmProvider)
//! backend and a factory ([`create_provider`]) that builds it from the agent
//! configuration.

pub mod openai_compat;

use secrecy::SecretString;

use aura_core::llm::box_provider::BoxLlmProvider;
use aura_types::config::AgentConfig;
use aura_types::llm::{CompletionRequest, LlmError, Message, MessageRole};

use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] for the configured endpoint and model.
pub fn create_provider(config: &AgentConfig, api_key: SecretString) -> BoxLlmProvider {
    let provider_config = openai_compat::config::for_base_url(&config.base_url, api_key, &config.model);
    BoxLlmProvider::new(OpenAiCompatibleProvider::new(provider_config))
}

/// Verify the provider answers by sending a minimal completion request.
pub async fn test_provider_connection(provider: &BoxLlmProvider) -> Result<(), LlmError> {
    let request = CompletionRequest {
        model: String::new(),
        messages: vec![Message {
            role: MessageRole::User,
            content: "Hello".to_string(),
        }],
        system: None,
        max_tokens: 10,
        temperature: Some(0.0),
    };
    provider.complete(&request).await?;
    Ok(())
}
