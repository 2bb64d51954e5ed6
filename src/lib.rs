//! Banter: voice/text conversational front-end core.
//!
//! Relays user utterances to a remote chat-completion endpoint and
//! renders/speaks the reply. The heart of the crate is the turn-taking
//! pipeline: a single coordinator task owning the conversation state and
//! arbitrating three mutually-interrupting activities (speech capture
//! events, network streaming, and speech synthesis).
//!
//! # Architecture
//!
//! Components are connected by async channels, leaf to root:
//! - **Transcript store** ([`transcript`]): the ordered message history,
//!   reset on context switch.
//! - **Speech output** ([`speech`]): utterance queue and talking
//!   indicator in front of a [`speech::Synthesizer`] seam.
//! - **Completion relay** ([`relay`]): HTTP client for the remote model,
//!   normalizing streaming and single-shot responses to one stream
//!   contract.
//! - **Turn coordinator** ([`pipeline`]): enforces "one active turn" and
//!   "new input interrupts all current output".
//!
//! The embedding application supplies the capture collaborator (anything
//! that sends [`InputEvent`]s), a synthesizer, and render sinks
//! (subscribers of [`UiEvent`]).

pub mod config;
pub mod error;
pub mod pipeline;
pub mod relay;
pub mod speech;
pub mod transcript;

pub use config::{AssistantConfig, ResponseMode};
pub use error::{AssistantError, Result};
pub use pipeline::coordinator::TurnCoordinator;
pub use pipeline::messages::{InputEvent, UiEvent};
pub use speech::{Synthesizer, VoiceSettings};
pub use transcript::{ContextKind, Message, Role, Transcript};
