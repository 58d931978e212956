//! Conversation run state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

pub mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, StreamEvent};
pub use event::Event;
pub use state::{ConvContext, ConvState, Termination, DEFAULT_MAX_TURNS};
pub use transition::{transition, TransitionError};
