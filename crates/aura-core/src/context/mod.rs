//! Prompt context assembly.

pub mod block;
pub mod builder;
pub mod directives;
pub mod realtime;
