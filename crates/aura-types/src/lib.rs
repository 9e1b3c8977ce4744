//! Shared domain types for Aura.
//!
//! This crate contains the domain types used across the agent: memory
//! records, conversation state, router decisions, social-network shapes,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod action;
pub mod config;
pub mod conversation;
pub mod error;
pub mod ledger;
pub mod llm;
pub mod memory;
pub mod social;
