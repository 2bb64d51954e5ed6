//! Event types exchanged between the coordinator, its collaborators, and
//! UI subscribers.

use crate::error::AssistantError;
use crate::transcript::{ContextKind, Role};

/// Input events driving the turn coordinator.
///
/// Produced by the speech-capture collaborator and by text frontends.
/// The capture contract is ordered: `CaptureStarted` always precedes the
/// `Utterance` it produces.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// The user started speaking; the assistant must yield the floor.
    CaptureStarted,
    /// Speech capture finished (with or without a result).
    CaptureEnded,
    /// A finished utterance from the capture collaborator.
    Utterance(String),
    /// A message typed into the text frontend.
    TypedMessage(String),
    /// The surrounding UI switched conversational context.
    ContextSwitch(ContextKind),
}

/// Events produced by the active turn's network task.
#[derive(Debug)]
pub(crate) enum TurnEvent {
    /// An incremental piece of assistant text.
    Fragment(String),
    /// The full reply; the turn is over.
    Completed(String),
    /// The turn failed; carries the internal error kind.
    Failed(AssistantError),
}

/// Render-sink notifications broadcast to UI subscribers.
///
/// The core supplies plain text; rich rendering (markdown and the like)
/// is the subscriber's concern.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A message was appended to the transcript view.
    MessageAppended {
        /// Who the message is from.
        role: Role,
        /// The message text, verbatim.
        text: String,
    },
    /// The status line changed.
    Status(String),
    /// The talking indicator changed.
    Talking(bool),
    /// The listening indicator changed.
    Listening(bool),
}
