//! Conversation state tracking: stop intent and reply-streak limits.

pub mod intent;
pub mod tracker;
