//! Turn state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! transition function never touches the network, it only returns the
//! effects the runtime should perform next.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Exchange};
pub use event::Event;
pub use state::{ToolCall, TurnContext, TurnState};
pub use transition::{transition, TransitionError, TransitionResult};
