//! Error types for the assistant core.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via
//! [`AssistantError::code()`]. Codes are part of the public API contract
//! and will not change.
//!
//! Cancellation is modelled as an error variant so a turn has exactly one
//! failure path, but it is never user-visible: the turn coordinator
//! suppresses it entirely (see [`AssistantError::is_cancellation()`]).

/// Stable error codes for programmatic error handling.
///
/// These codes never change and form part of the public API contract.
/// Use these for distinguishing errors rather than parsing Display output.
pub mod error_codes {
    /// Turn was cancelled by new user input or a context switch.
    pub const CANCELLED: &str = "CANCELLED";

    /// The remote endpoint answered with a non-success HTTP status.
    pub const NETWORK_FAILED: &str = "NETWORK_FAILED";

    /// The response body violated the expected wire format.
    pub const PROTOCOL_VIOLATION: &str = "PROTOCOL_VIOLATION";

    /// Connection-level failure before or during the response.
    pub const TRANSPORT_FAILED: &str = "TRANSPORT_FAILED";

    /// The model completed but produced no usable content.
    pub const EMPTY_REPLY: &str = "EMPTY_REPLY";

    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
}

/// Errors produced by the assistant core.
///
/// Each variant includes a stable error code accessible via
/// [`AssistantError::code()`]. The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Turn was cancelled by new user input or a context switch.
    #[error("[{}] turn cancelled", error_codes::CANCELLED)]
    Cancelled,

    /// The remote endpoint answered with a non-success HTTP status.
    #[error("[{}] remote endpoint returned HTTP {status}", error_codes::NETWORK_FAILED)]
    Network {
        /// The HTTP status code received.
        status: u16,
    },

    /// The response body violated the expected wire format.
    #[error("[{}] {}", error_codes::PROTOCOL_VIOLATION, .0)]
    Protocol(String),

    /// Connection-level failure before or during the response.
    #[error("[{}] {}", error_codes::TRANSPORT_FAILED, .0)]
    Transport(String),

    /// The model completed but produced no usable content.
    #[error("[{}] remote model returned no usable content", error_codes::EMPTY_REPLY)]
    EmptyReply,

    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),
}

impl AssistantError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cancelled => error_codes::CANCELLED,
            Self::Network { .. } => error_codes::NETWORK_FAILED,
            Self::Protocol(_) => error_codes::PROTOCOL_VIOLATION,
            Self::Transport(_) => error_codes::TRANSPORT_FAILED,
            Self::EmptyReply => error_codes::EMPTY_REPLY,
            Self::Config(_) => error_codes::CONFIG_INVALID,
        }
    }

    /// Whether this error is a user-initiated cancellation.
    ///
    /// Cancellations are silent: the coordinator renders no status text
    /// for them, unlike every other failure kind.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience alias for assistant results.
pub type Result<T> = std::result::Result<T, AssistantError>;
