//! Conversation loop state machine
//!
//! Elm-style: a pure `transition` maps (state, event) to a new state plus the
//! effects the runtime must carry out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvContext, LoopState};
pub use transition::{initial_effects, transition, TransitionError};
