//! Events that can occur in a conversation

use crate::llm::{CombinedMessage, Turn};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Input events
    UserTurn { text: String },
    InputClosed,

    // Model events
    ModelReplied { message: CombinedMessage },

    // Action events
    /// One result turn per dispatched request, in request order
    ActionsCompleted { results: Vec<Turn> },
}
