//! LLM provider abstractions for Aura.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `ModelClient`: role-aware invocation with retry

pub mod box_provider;
pub mod client;
pub mod provider;
