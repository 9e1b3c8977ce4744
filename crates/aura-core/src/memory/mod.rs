//! Durable memory: learning requests, fact extraction, summaries, and the
//! policy service that guards the store.

pub mod extractor;
pub mod learning;
pub mod service;
pub mod summarizer;
