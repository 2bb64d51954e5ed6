//! Remote completion relay: HTTP client and stream parsing.

pub mod client;
pub mod sse;

pub use client::{CompletionClient, ReplyEvent, ReplyStream};
