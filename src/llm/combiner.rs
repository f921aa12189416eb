//! Reassembly of one streamed round into a single assistant turn
//!
//! Fragments must agree on the identity of the turn they belong to. Action
//! requests are stitched together with a correlation-id cursor: the upstream
//! format sends the full id only on the first fragment of each request, so a
//! fragment with an empty id continues whatever request the cursor points at.
//!
//! Requests are assumed not to interleave on the wire. If they do, pieces are
//! appended to whichever request the cursor last switched to, which corrupts
//! the arguments of both; that case is not detected.

use super::types::{ActionRequest, CombinedMessage, FinishReason, Fragment, Role, Turn};
use std::collections::HashMap;
use std::fmt::Debug;
use thiserror::Error;

/// Reasons a round cannot be combined
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CombineError {
    #[error("no fragments to combine")]
    NoFragments,
    /// Fragments disagree on `field`, including a differing choice count
    #[error("inconsistent stream: mismatched {field}: {detail}")]
    InconsistentStream { field: &'static str, detail: String },
    /// Every fragment agrees on a choice count, but the count is not 1
    #[error("expected exactly one choice per fragment, got {0}")]
    UnsupportedChoiceCount(usize),
}

/// Combine the fragments of one round, in arrival order
pub fn combine(fragments: &[Fragment]) -> Result<CombinedMessage, CombineError> {
    let first = fragments.first().ok_or(CombineError::NoFragments)?;

    check_unique("id", fragments, |f| f.id.clone())?;
    check_unique("object", fragments, |f| f.object.clone())?;
    check_unique("model", fragments, |f| f.model.clone())?;
    check_unique("created", fragments, |f| f.created)?;
    check_unique("choice count", fragments, |f| f.choices.len())?;
    if first.choices.len() != 1 {
        return Err(CombineError::UnsupportedChoiceCount(first.choices.len()));
    }
    check_cardinality(fragments)?;
    check_unique("choice index", fragments, |f| f.choices[0].index)?;

    let tool_calls = merge_action_requests(fragments);

    let mut role = None;
    let mut content = String::new();
    let mut finish = None;
    for fragment in fragments {
        let choice = &fragment.choices[0];
        if let Some(r) = choice.delta.role {
            role = Some(r);
        }
        if let Some(piece) = &choice.delta.content {
            content.push_str(piece);
        }
        if let Some(reason) = choice.finish_reason.as_deref().filter(|r| !r.is_empty()) {
            finish = Some(reason.to_string());
        }
    }

    let mut turn = Turn::assistant(content, tool_calls);
    turn.role = role.unwrap_or(Role::Assistant);

    Ok(CombinedMessage {
        id: first.id.clone(),
        object: first.object.clone(),
        created: first.created,
        model: first.model.clone(),
        index: first.choices[0].index,
        turn,
        finish: finish.map_or_else(
            || FinishReason::Other(String::new()),
            |raw| FinishReason::from_wire(&raw),
        ),
    })
}

/// Every fragment must report the same value for `field`
fn check_unique<T, F>(field: &'static str, fragments: &[Fragment], value: F) -> Result<(), CombineError>
where
    T: PartialEq + Debug,
    F: Fn(&Fragment) -> T,
{
    let mut seen: Vec<T> = Vec::new();
    for fragment in fragments {
        let v = value(fragment);
        if !seen.contains(&v) {
            seen.push(v);
        }
    }
    if seen.len() > 1 {
        return Err(CombineError::InconsistentStream {
            field,
            detail: format!("{seen:?}"),
        });
    }
    Ok(())
}

/// A fragment carries either no action-request piece or exactly one
fn check_cardinality(fragments: &[Fragment]) -> Result<(), CombineError> {
    let counts: Vec<usize> = fragments
        .iter()
        .map(|f| f.choices[0].delta.tool_calls.len())
        .collect();
    if let Some(bad) = counts.iter().find(|&&n| n > 1) {
        return Err(CombineError::InconsistentStream {
            field: "action request count",
            detail: format!("fragment carries {bad} action requests, expected 0 or 1"),
        });
    }
    Ok(())
}

fn merge_action_requests(fragments: &[Fragment]) -> Vec<ActionRequest> {
    let mut assembled: Vec<ActionRequest> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut cursor: Option<String> = None;

    for fragment in fragments {
        let Some(piece) = fragment.choices[0].delta.tool_calls.first() else {
            continue;
        };

        let starts_new = match &cursor {
            None => true,
            Some(current) => !piece.id.is_empty() && *current != piece.id,
        };
        if starts_new {
            cursor = Some(piece.id.clone());
        }
        let key = cursor.clone().unwrap_or_default();

        let slot = *positions.entry(key.clone()).or_insert_with(|| {
            assembled.push(ActionRequest {
                id: key,
                ..ActionRequest::default()
            });
            assembled.len() - 1
        });
        let request = &mut assembled[slot];

        if !piece.kind.is_empty() {
            request.kind.clone_from(&piece.kind);
        }
        if !piece.call.name.is_empty() {
            if !request.call.name.is_empty() && request.call.name != piece.call.name {
                tracing::warn!(
                    id = %request.id,
                    previous = %request.call.name,
                    replacement = %piece.call.name,
                    "Action name replaced mid-stream"
                );
            }
            request.call.name.clone_from(&piece.call.name);
        }
        request.call.arguments.push_str(&piece.call.arguments);
    }

    assembled
}
