//! Property-based tests for the state machine

use super::transition::*;
use super::*;
use crate::llm::{ActionRequest, CombinedMessage, FinishReason, Turn};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn arb_context() -> impl Strategy<Value = ConvContext> {
    any::<bool>().prop_map(ConvContext::new)
}

fn arb_request() -> impl Strategy<Value = ActionRequest> {
    (
        "call_[a-z0-9]{6}",
        prop_oneof![
            Just("SummationRequest"),
            Just("TextSorter"),
            Just("Command"),
        ],
        "\\{[a-z\":0-9 ]{0,20}\\}",
    )
        .prop_map(|(id, name, arguments)| ActionRequest::new(id, name, arguments))
}

fn arb_finish() -> impl Strategy<Value = FinishReason> {
    prop_oneof![
        Just(FinishReason::ActionRequested),
        Just(FinishReason::Ended),
        Just(FinishReason::Other("length".to_string())),
    ]
}

fn arb_message() -> impl Strategy<Value = CombinedMessage> {
    (
        "[a-zA-Z ]{0,30}",
        proptest::collection::vec(arb_request(), 0..4),
        arb_finish(),
    )
        .prop_map(|(content, requests, finish)| CombinedMessage {
            id: "chatcmpl-1".to_string(),
            object: "chat.completion.chunk".to_string(),
            created: 1,
            model: "gpt-test".to_string(),
            index: 0,
            turn: Turn::assistant(content, requests),
            finish,
        })
}

fn arb_results() -> impl Strategy<Value = Vec<Turn>> {
    proptest::collection::vec(
        ("call_[a-z0-9]{6}", "[a-z ]{0,20}")
            .prop_map(|(id, content)| Turn::action_result(id, "TextSorter", content)),
        0..4,
    )
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z ]{0,30}".prop_map(|text| Event::UserTurn { text }),
        Just(Event::InputClosed),
        arb_message().prop_map(|message| Event::ModelReplied { message }),
        arb_results().prop_map(|results| Event::ActionsCompleted { results }),
    ]
}

fn arb_state() -> impl Strategy<Value = LoopState> {
    prop_oneof![
        Just(LoopState::AwaitingInput),
        (1u32..5).prop_map(|round| LoopState::AwaitingModel { round }),
        (1u32..5, proptest::collection::vec(arb_request(), 1..4))
            .prop_map(|(round, requests)| LoopState::ActionDispatch { round, requests }),
        Just(LoopState::Terminal),
    ]
}

// ============================================================================
// Helpers
// ============================================================================

fn yields_event(effect: &Effect) -> bool {
    matches!(
        effect,
        Effect::ReadInput | Effect::RequestModel { .. } | Effect::DispatchActions { .. }
    )
}

/// The next event comes from at most one effect, and it is the last one
fn event_effect_is_last(effects: &[Effect]) -> bool {
    let positions: Vec<usize> = effects
        .iter()
        .enumerate()
        .filter(|(_, e)| yields_event(e))
        .map(|(i, _)| i)
        .collect();
    match positions.as_slice() {
        [] => true,
        [i] => *i == effects.len() - 1,
        _ => false,
    }
}

/// Every state but Terminal must be waiting on exactly one effect
fn waits_on_one_effect(state: &LoopState, effects: &[Effect]) -> bool {
    let pending = effects.iter().filter(|e| yields_event(e)).count();
    if state.is_terminal() {
        pending == 0
    } else {
        pending == 1
    }
}

fn dispatch_matches_state(state: &LoopState, effects: &[Effect]) -> bool {
    effects.iter().all(|effect| match (effect, state) {
        (Effect::DispatchActions { requests }, LoopState::ActionDispatch { requests: held, .. }) => {
            requests == held
        }
        (Effect::DispatchActions { .. }, _) => false,
        (Effect::RequestModel { round }, LoopState::AwaitingModel { round: now }) => round == now,
        (Effect::RequestModel { .. }, _) => false,
        (Effect::ReadInput, s) => *s == LoopState::AwaitingInput,
        _ => true,
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_effects_agree_with_new_state(
        context in arb_context(),
        events in proptest::collection::vec(arb_event(), 0..20),
    ) {
        let mut state = LoopState::initial(&context);
        for event in events {
            let Ok(result) = transition(&state, &context, event) else {
                continue;
            };
            prop_assert!(
                event_effect_is_last(&result.effects),
                "event effect not last: {:?}",
                result.effects
            );
            prop_assert!(
                waits_on_one_effect(&result.new_state, &result.effects),
                "{:?} with {:?}",
                result.new_state,
                result.effects
            );
            prop_assert!(dispatch_matches_state(&result.new_state, &result.effects));
            state = result.new_state;
        }
    }

    #[test]
    fn prop_terminal_accepts_nothing(context in arb_context(), event in arb_event()) {
        prop_assert_eq!(
            transition(&LoopState::Terminal, &context, event).unwrap_err(),
            TransitionError::Finished
        );
    }

    #[test]
    fn prop_reply_is_appended_first(
        context in arb_context(),
        round in 1u32..5,
        message in arb_message(),
    ) {
        let turn = message.turn.clone();
        let result = transition(
            &LoopState::AwaitingModel { round },
            &context,
            Event::ModelReplied { message },
        ).unwrap();
        prop_assert_eq!(&result.effects[0], &Effect::AppendTurn(turn));
    }

    #[test]
    fn prop_only_action_rounds_dispatch(
        context in arb_context(),
        round in 1u32..5,
        message in arb_message(),
    ) {
        let dispatches = message.requests_actions() && !message.turn.tool_calls.is_empty();
        let requests = message.turn.tool_calls.clone();
        let content = message.turn.content.clone();
        let result = transition(
            &LoopState::AwaitingModel { round },
            &context,
            Event::ModelReplied { message },
        ).unwrap();

        if dispatches {
            let answered = result.effects.iter().any(|e| matches!(e, Effect::EmitAnswer { .. }));
            prop_assert!(!answered);
            prop_assert_eq!(result.new_state, LoopState::ActionDispatch { round, requests });
        } else {
            let answer = Effect::EmitAnswer { content };
            let answered = result.effects.contains(&answer);
            prop_assert!(answered);
            let expected = if context.one_shot {
                LoopState::Terminal
            } else {
                LoopState::AwaitingInput
            };
            prop_assert_eq!(result.new_state, expected);
        }
    }

    #[test]
    fn prop_results_fold_in_order(
        context in arb_context(),
        round in 1u32..5,
        results in arb_results(),
    ) {
        let requests: Vec<ActionRequest> = results
            .iter()
            .map(|t| ActionRequest::new(t.tool_call_id.clone().unwrap_or_default(), "TextSorter", "{}"))
            .collect();
        prop_assume!(!requests.is_empty());

        let result = transition(
            &LoopState::ActionDispatch { round, requests },
            &context,
            Event::ActionsCompleted { results: results.clone() },
        ).unwrap();

        prop_assert_eq!(&result.new_state, &LoopState::AwaitingModel { round: round + 1 });
        let appended: Vec<Turn> = result
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::AppendTurn(turn) => Some(turn.clone()),
                _ => None,
            })
            .collect();
        prop_assert_eq!(appended, results);
    }

    #[test]
    fn prop_result_count_must_match(
        context in arb_context(),
        state in arb_state(),
        results in arb_results(),
    ) {
        if let LoopState::ActionDispatch { requests, .. } = &state {
            let expected = requests.len();
            let got = results.len();
            let outcome = transition(&state, &context, Event::ActionsCompleted { results });
            if expected == got {
                prop_assert!(outcome.is_ok());
            } else {
                prop_assert_eq!(
                    outcome.unwrap_err(),
                    TransitionError::ResultCountMismatch { expected, got }
                );
            }
        }
    }

    #[test]
    fn prop_blank_input_is_ignored(text in "[ \t]{0,8}") {
        let result = transition(
            &LoopState::AwaitingInput,
            &ConvContext::new(false),
            Event::UserTurn { text },
        ).unwrap();
        prop_assert_eq!(result.new_state, LoopState::AwaitingInput);
        prop_assert_eq!(result.effects, vec![Effect::ReadInput]);
    }
}
