//! Decision and memory engine for Aura.
//!
//! This crate defines the ports (repository traits, the LLM provider trait,
//! the social client trait) and every piece of decision logic. It depends
//! only on `aura-types`, never on `aura-infra` or any database/IO crate.

pub mod context;
pub mod conversation;
pub mod engine;
pub mod llm;
pub mod memory;
pub mod pipeline;
pub mod repository;
pub mod retry;
pub mod router;
pub mod social;

#[cfg(test)]
mod testing;
