//! Conversation state types

use crate::llm::ActionRequest;

/// Where the conversation loop currently is
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoopState {
    /// Waiting for the next user turn
    #[default]
    AwaitingInput,

    /// A turn request is in flight; `round` counts requests since the last user turn
    AwaitingModel { round: u32 },

    /// The model asked for actions; results are folded in before the next round
    ActionDispatch {
        round: u32,
        requests: Vec<ActionRequest>,
    },

    /// Input closed, or the one-shot answer was produced
    Terminal,
}

impl LoopState {
    /// State a fresh conversation starts in
    pub fn initial(context: &ConvContext) -> Self {
        if context.one_shot {
            LoopState::AwaitingModel { round: 1 }
        } else {
            LoopState::AwaitingInput
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Terminal)
    }
}

/// Fixed parameters of one conversation
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvContext {
    /// Stop at the first answer instead of reading more input
    pub one_shot: bool,
}

impl ConvContext {
    pub fn new(one_shot: bool) -> Self {
        Self { one_shot }
    }
}
