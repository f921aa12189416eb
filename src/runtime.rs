//! Runtime for executing conversations
//!
//! Drives the pure state machine against real (or mocked) I/O: the chat
//! transport, the user's input and the terminal the answer streams to.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationRuntime, RequestSettings};
pub use traits::*;
