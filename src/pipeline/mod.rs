//! Turn-taking pipeline: the coordinator and its message contracts.

pub mod coordinator;
pub mod messages;

pub use coordinator::TurnCoordinator;
pub use messages::{InputEvent, UiEvent};
