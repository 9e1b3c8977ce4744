//! Repository trait definitions (ports) for Aura.
//!
//! These traits define the persistence contracts that the infrastructure
//! layer implements. They use RPITIT (Rust 2024 edition) so no
//! `async_trait` macro is needed.

pub mod conversation;
pub mod directive;
pub mod ledger;
pub mod memory;
