//! Configuration and defaults for OpenAI-compatible providers.
//!
//! The agent talks to OpenRouter by default, but any endpoint speaking the
//! OpenAI chat completions protocol works with a different base URL.

use secrecy::SecretString;

use aura_types::llm::ProviderCapabilities;

/// Default OpenRouter endpoint.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Configuration for an OpenAI-compatible LLM provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openrouter").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://openrouter.ai/api/v1").
    pub base_url: String,
    pub api_key: SecretString,
    /// Default model identifier, used when a request leaves it empty.
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

/// OpenRouter configuration for the given model.
pub fn openrouter_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    custom_endpoint("openrouter", OPENROUTER_BASE_URL, api_key, model)
}

/// Configuration for an arbitrary OpenAI-compatible endpoint.
///
/// The provider name is derived from the host for well-known endpoints.
pub fn for_base_url(base_url: &str, api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    let name = if base_url.contains("openrouter.ai") {
        "openrouter"
    } else if base_url.contains("api.openai.com") {
        "openai"
    } else {
        "openai_compatible"
    };
    custom_endpoint(name, base_url, api_key, model)
}

fn custom_endpoint(name: &str, base_url: &str, api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: name.into(),
        base_url: base_url.trim_end_matches('/').into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            max_context_tokens: 128_000,
            max_output_tokens: 8_192,
        },
    }
}
