//! Infrastructure layer for Aura.
//!
//! Contains implementations of the ports defined in `aura-core`: SQLite
//! storage, the Bluesky XRPC client, the OpenAI-compatible model provider,
//! and configuration loading.

pub mod bluesky;
pub mod config;
pub mod llm;
pub mod sqlite;
