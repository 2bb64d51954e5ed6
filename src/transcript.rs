//! Conversation transcript: the ordered, role-tagged message history.
//!
//! The transcript always starts with exactly one system message (the
//! conversation context) and is owned and mutated exclusively by the turn
//! coordinator. Switching context replaces the transcript wholesale; it
//! never appends a second system message.
//!
//! # Examples
//!
//! ```
//! use banter::transcript::{Message, Role, Transcript};
//!
//! let mut transcript = Transcript::new("You are a helpful assistant.");
//! transcript.append(Message::user("Hello"));
//! assert_eq!(transcript.messages().len(), 2);
//! assert_eq!(transcript.messages()[0].role, Role::System);
//! ```

use serde::{Deserialize, Serialize};

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (the conversation context).
    System,
    /// User input, spoken or typed.
    User,
    /// Assistant (model) output.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in the conversation. Immutable once appended.
///
/// Serializes to the wire shape `{"role": ..., "content": ...}` expected
/// by the chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: Role,
    /// Plain text content.
    pub content: String,
}

impl Message {
    /// Create a message with the given role.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }
}

/// Which conversational context frames the transcript.
///
/// Each kind selects a distinct system-message payload from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// Spoken conversation: brief, speakable replies.
    Voice,
    /// Typed conversation: fuller replies, markdown allowed.
    Chat,
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voice => write!(f, "voice"),
            Self::Chat => write!(f, "chat"),
        }
    }
}

/// Ordered message history for one conversation.
///
/// Invariants: never empty; the first (and only) system message is at
/// index zero. Role alternation of user/assistant messages is NOT
/// validated; rapid re-submission can legitimately produce two
/// consecutive user messages.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create a transcript containing only the given system context.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(context)],
        }
    }

    /// Discard all history and restart from the given system context.
    pub fn reset(&mut self, context: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::system(context));
    }

    /// Append a message to the end of the history.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The full ordered history, ready for submission to the relay client.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages, including the system context.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// A transcript is never empty, but the standard pairing is provided.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
