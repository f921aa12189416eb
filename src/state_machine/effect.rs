//! Effects produced by state transitions

use crate::llm::{ActionRequest, Turn};

/// Effects to be executed after state transition
///
/// Within one transition, the effect that yields the next event comes last.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a turn to the transcript
    AppendTurn(Turn),

    /// Block for the next user turn
    ReadInput,

    /// Issue a turn request with the full transcript
    RequestModel { round: u32 },

    /// Run the requested actions in order
    DispatchActions { requests: Vec<ActionRequest> },

    /// Hand the answer of a non-action round to the caller
    EmitAnswer { content: String },
}
