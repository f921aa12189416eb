//! Pure state transition function

use super::{ConvContext, Effect, Event, LoopState};
use crate::llm::{CombinedMessage, Turn};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: LoopState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: LoopState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Conversation already finished")]
    Finished,
    #[error("Expected {expected} action results, got {got}")]
    ResultCountMismatch { expected: usize, got: usize },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Effects that begin a conversation in `state`
pub fn initial_effects(state: &LoopState) -> Vec<Effect> {
    match state {
        LoopState::AwaitingInput => vec![Effect::ReadInput],
        LoopState::AwaitingModel { round } => vec![Effect::RequestModel { round: *round }],
        LoopState::ActionDispatch { requests, .. } => vec![Effect::DispatchActions {
            requests: requests.clone(),
        }],
        LoopState::Terminal => vec![],
    }
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// expressed as returned effects.
pub fn transition(
    state: &LoopState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Input
        // ============================================================
        (LoopState::AwaitingInput, Event::UserTurn { text }) => {
            if text.trim().is_empty() {
                return Ok(TransitionResult::new(LoopState::AwaitingInput)
                    .with_effect(Effect::ReadInput));
            }
            Ok(TransitionResult::new(LoopState::AwaitingModel { round: 1 })
                .with_effect(Effect::AppendTurn(Turn::user(text)))
                .with_effect(Effect::RequestModel { round: 1 }))
        }

        (LoopState::AwaitingInput, Event::InputClosed) => {
            Ok(TransitionResult::new(LoopState::Terminal))
        }

        // ============================================================
        // Model replies
        // ============================================================
        (LoopState::AwaitingModel { round }, Event::ModelReplied { message }) => {
            Ok(handle_reply(*round, context, message))
        }

        // ============================================================
        // Action results
        // ============================================================
        (LoopState::ActionDispatch { round, requests }, Event::ActionsCompleted { results }) => {
            if results.len() != requests.len() {
                return Err(TransitionError::ResultCountMismatch {
                    expected: requests.len(),
                    got: results.len(),
                });
            }
            let next = round + 1;
            Ok(TransitionResult::new(LoopState::AwaitingModel { round: next })
                .with_effects(results.into_iter().map(Effect::AppendTurn))
                .with_effect(Effect::RequestModel { round: next }))
        }

        (LoopState::Terminal, _) => Err(TransitionError::Finished),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} while {state:?}"
        ))),
    }
}

fn handle_reply(round: u32, context: &ConvContext, message: CombinedMessage) -> TransitionResult {
    let actions = message.requests_actions();
    let turn = message.turn;
    let dispatch = actions && !turn.tool_calls.is_empty();

    if dispatch {
        let requests = turn.tool_calls.clone();
        return TransitionResult::new(LoopState::ActionDispatch {
            round,
            requests: requests.clone(),
        })
        .with_effect(Effect::AppendTurn(turn))
        .with_effect(Effect::DispatchActions { requests });
    }

    // Not an action round (or one that assembled no requests): the content is the answer
    let content = turn.content.clone();
    let result = TransitionResult::new(if context.one_shot {
        LoopState::Terminal
    } else {
        LoopState::AwaitingInput
    })
    .with_effect(Effect::AppendTurn(turn))
    .with_effect(Effect::EmitAnswer { content });

    if context.one_shot {
        result
    } else {
        result.with_effect(Effect::ReadInput)
    }
}
