//! LlmProvider trait definition.
//!
//! This is the core abstraction that the model backend implements. The
//! engine only needs whole completions, so there is no streaming surface.

use aura_types::llm::{CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities};

/// Trait for LLM provider backends (OpenRouter, any OpenAI-compatible API).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in aura-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openrouter").
    fn name(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
