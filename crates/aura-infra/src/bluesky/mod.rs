//! Bluesky (AT Protocol) social client.

pub mod client;
pub mod types;

pub use client::BlueskyClient;
