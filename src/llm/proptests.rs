//! Property-based tests for stream reassembly
//!
//! A reference assistant turn is cut into an arbitrary fragmentation of its
//! content and argument strings, pushed through the wire encoding and the
//! frame parser, and combined again. The result must match the reference.

use super::combiner::{combine, CombineError};
use super::frame::{parse_line, Frame};
use super::types::{
    ActionRequest, Delta, FinishReason, Fragment, FragmentChoice, FunctionCall, Role, Turn,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Split `text` at the given (unsorted, possibly duplicated) char offsets
fn split_at_offsets(text: &str, mut offsets: Vec<usize>) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    offsets.retain(|&o| o > 0 && o < chars.len());
    offsets.sort_unstable();
    offsets.dedup();

    let mut pieces = Vec::new();
    let mut start = 0;
    for cut in offsets.into_iter().chain(std::iter::once(chars.len())) {
        pieces.push(chars[start..cut].iter().collect());
        start = cut;
    }
    pieces
}

fn arb_pieces(text: String) -> impl Strategy<Value = Vec<String>> {
    let len = text.chars().count();
    proptest::collection::vec(0..=len.max(1), 0..6)
        .prop_map(move |offsets| split_at_offsets(&text, offsets))
}

fn arb_request(n: usize) -> impl Strategy<Value = ActionRequest> {
    (
        "[A-Z][a-zA-Z]{2,15}",
        r#"\{"[A-Za-z]{1,8}":\[[0-9, ]{0,20}\]\}"#,
    )
        .prop_map(move |(name, arguments)| ActionRequest::new(format!("call_{n}"), name, arguments))
}

fn arb_requests() -> impl Strategy<Value = Vec<ActionRequest>> {
    (0usize..4).prop_flat_map(|count| (0..count).map(arb_request).collect::<Vec<_>>())
}

/// A reference turn plus the pieces it is streamed as
#[derive(Debug, Clone)]
struct Scenario {
    content: String,
    content_pieces: Vec<String>,
    requests: Vec<ActionRequest>,
    argument_pieces: Vec<Vec<String>>,
}

fn arb_scenario() -> impl Strategy<Value = Scenario> {
    ("[a-zA-Z0-9 .,!?\u{e9}\u{4e16}]{0,60}", arb_requests())
        .prop_flat_map(|(content, requests)| {
            let content_pieces = arb_pieces(content.clone());
            let argument_pieces: Vec<_> = requests
                .iter()
                .map(|r| arb_pieces(r.arguments().to_string()))
                .collect();
            (
                Just(content),
                content_pieces,
                Just(requests),
                argument_pieces,
            )
        })
        .prop_map(|(content, content_pieces, requests, argument_pieces)| Scenario {
            content,
            content_pieces,
            requests,
            argument_pieces,
        })
}

// ============================================================================
// Wire helpers
// ============================================================================

fn fragment(delta: Delta, finish_reason: Option<&str>) -> Fragment {
    Fragment {
        id: "chatcmpl-prop".to_string(),
        object: "chat.completion.chunk".to_string(),
        created: 1_700_000_123,
        model: "gpt-prop".to_string(),
        choices: vec![FragmentChoice {
            index: 0,
            delta,
            finish_reason: finish_reason.map(str::to_string),
        }],
    }
}

/// Stream a scenario the way the upstream service does: the first piece of
/// each request carries id and name, continuation pieces carry neither.
fn stream(scenario: &Scenario) -> Vec<Fragment> {
    let mut fragments = vec![fragment(
        Delta {
            role: Some(Role::Assistant),
            ..Delta::default()
        },
        None,
    )];

    for piece in &scenario.content_pieces {
        fragments.push(fragment(
            Delta {
                content: Some(piece.clone()),
                ..Delta::default()
            },
            None,
        ));
    }

    for (request, pieces) in scenario.requests.iter().zip(&scenario.argument_pieces) {
        for (i, piece) in pieces.iter().enumerate() {
            let head = i == 0;
            fragments.push(fragment(
                Delta {
                    tool_calls: vec![ActionRequest {
                        id: if head { request.id.clone() } else { String::new() },
                        kind: if head { request.kind.clone() } else { String::new() },
                        call: FunctionCall {
                            name: if head { request.name().to_string() } else { String::new() },
                            arguments: piece.clone(),
                        },
                    }],
                    ..Delta::default()
                },
                None,
            ));
        }
    }

    let reason = if scenario.requests.is_empty() { "stop" } else { "tool_calls" };
    fragments.push(fragment(Delta::default(), Some(reason)));
    fragments
}

fn through_wire(fragments: &[Fragment]) -> Vec<Fragment> {
    fragments
        .iter()
        .map(|f| format!("data: {}", serde_json::to_string(f).unwrap()))
        .chain(std::iter::once("data: [DONE]".to_string()))
        .map_while(|line| match parse_line(&line).unwrap() {
            Frame::Fragment(f) => Some(*f),
            Frame::Done | Frame::Ignore => None,
        })
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn combined_matches_reference(scenario in arb_scenario()) {
        let fragments = through_wire(&stream(&scenario));
        let combined = combine(&fragments).unwrap();

        let reference = Turn::assistant(scenario.content.clone(), scenario.requests.clone());
        prop_assert_eq!(&combined.turn, &reference);
        if scenario.requests.is_empty() {
            prop_assert_eq!(combined.finish, FinishReason::Ended);
        } else {
            prop_assert_eq!(combined.finish, FinishReason::ActionRequested);
        }
    }

    #[test]
    fn any_foreign_turn_id_is_rejected(scenario in arb_scenario(), victim in any::<prop::sample::Index>()) {
        let mut fragments = stream(&scenario);
        let i = victim.index(fragments.len());
        fragments[i].id = "chatcmpl-intruder".to_string();
        let err = combine(&fragments).unwrap_err();
        let is_inconsistent = matches!(err, CombineError::InconsistentStream { field: "id", .. });
        prop_assert!(is_inconsistent);
    }

    #[test]
    fn splitting_never_changes_text(text in "[a-z \u{e9}]{0,40}", offsets in proptest::collection::vec(0usize..50, 0..8)) {
        let pieces = split_at_offsets(&text, offsets);
        prop_assert_eq!(pieces.concat(), text);
    }
}
