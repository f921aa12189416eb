//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::{InputSource, OutputSink};
use crate::actions::{ActionError, Handler, NoParams};
use crate::llm::{
    ActionRequest, ChatRequest, Delta, Fragment, FragmentChoice, FunctionCall, LineStream,
    LlmError, LlmService, Role,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock LLM Client
// ============================================================================

type Script = Result<Vec<Result<String, LlmError>>, LlmError>;

/// Mock transport that replays queued wire lines, one script per round
pub struct MockLlmClient {
    scripts: Mutex<VecDeque<Script>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a round that streams these lines
    pub fn queue_lines(&self, lines: Vec<String>) {
        self.queue_stream(lines.into_iter().map(Ok).collect());
    }

    /// Queue a round whose body may fail part way
    pub fn queue_stream(&self, items: Vec<Result<String, LlmError>>) {
        self.scripts.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a round that fails before streaming
    pub fn queue_error(&self, error: LlmError) {
        self.scripts.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<LineStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))?;
        Ok(Box::pin(futures::stream::iter(script)))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Wire line builders
// ============================================================================

/// One action request as it is streamed: argument text in pieces
pub struct StreamedCall {
    id: String,
    name: String,
    pieces: Vec<String>,
}

pub fn call(id: &str, name: &str, pieces: &[&str]) -> StreamedCall {
    StreamedCall {
        id: id.to_string(),
        name: name.to_string(),
        pieces: pieces.iter().map(|p| (*p).to_string()).collect(),
    }
}

fn fragment_line(id: &str, delta: Delta, finish_reason: Option<&str>) -> String {
    let fragment = Fragment {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created: 1_700_000_000,
        model: "gpt-test".to_string(),
        choices: vec![FragmentChoice {
            index: 0,
            delta,
            finish_reason: finish_reason.map(str::to_string),
        }],
    };
    format!("data: {}", serde_json::to_string(&fragment).unwrap())
}

fn role_line(id: &str) -> String {
    fragment_line(
        id,
        Delta {
            role: Some(Role::Assistant),
            content: Some(String::new()),
            ..Delta::default()
        },
        None,
    )
}

/// Lines of a plain round: role head, content pieces, finish, sentinel
pub fn content_round(id: &str, pieces: &[&str], finish: &str) -> Vec<String> {
    let mut lines = vec![role_line(id)];
    for piece in pieces {
        lines.push(String::new());
        lines.push(fragment_line(
            id,
            Delta {
                content: Some((*piece).to_string()),
                ..Delta::default()
            },
            None,
        ));
    }
    lines.push(fragment_line(id, Delta::default(), Some(finish)));
    lines.push("data: [DONE]".to_string());
    lines
}

/// Lines of an action round; only the first piece of each call carries its id and name
pub fn action_round(id: &str, calls: &[StreamedCall]) -> Vec<String> {
    let mut lines = vec![role_line(id)];
    for streamed in calls {
        for (i, piece) in streamed.pieces.iter().enumerate() {
            let head = i == 0;
            let request = ActionRequest {
                id: if head { streamed.id.clone() } else { String::new() },
                kind: if head { "function".to_string() } else { String::new() },
                call: FunctionCall {
                    name: if head { streamed.name.clone() } else { String::new() },
                    arguments: piece.clone(),
                },
            };
            lines.push(fragment_line(
                id,
                Delta {
                    tool_calls: vec![request],
                    ..Delta::default()
                },
                None,
            ));
        }
    }
    lines.push(fragment_line(id, Delta::default(), Some("tool_calls")));
    lines.push("data: [DONE]".to_string());
    lines
}

/// Rewrite the finish reason of every fragment that carries one
pub fn with_finish(lines: Vec<String>, finish: &str) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            let Some(payload) = line.strip_prefix("data: ") else {
                return line;
            };
            let Ok(mut fragment) = serde_json::from_str::<Fragment>(payload) else {
                return line;
            };
            for choice in &mut fragment.choices {
                if choice.finish_reason.is_some() {
                    choice.finish_reason = Some(finish.to_string());
                }
            }
            format!("data: {}", serde_json::to_string(&fragment).unwrap())
        })
        .collect()
}

// ============================================================================
// Scripted input and recording output
// ============================================================================

/// Input that yields fixed lines, then reports closed
#[derive(Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            lines: lines.into_iter().map(str::to_string).collect(),
        }
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next_turn(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// Output sink that records everything; clones share the record
#[derive(Clone, Default)]
pub struct RecordingSink {
    text: Arc<Mutex<String>>,
    rounds: Arc<Mutex<usize>>,
}

impl RecordingSink {
    pub fn text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    pub fn rounds(&self) -> usize {
        *self.rounds.lock().unwrap()
    }
}

impl OutputSink for RecordingSink {
    fn write_delta(&mut self, text: &str) {
        self.text.lock().unwrap().push_str(text);
    }

    fn end_round(&mut self) {
        *self.rounds.lock().unwrap() += 1;
    }
}

// ============================================================================
// Test actions
// ============================================================================

/// Action whose execution always fails
pub struct FailingAction;

#[async_trait]
impl Handler for FailingAction {
    type Params = NoParams;

    fn name(&self) -> &'static str {
        "Fail"
    }

    fn description(&self) -> &'static str {
        "always fails"
    }

    async fn run(&self, _params: &NoParams) -> Result<String, ActionError> {
        Err(ActionError::Failed("boom".to_string()))
    }
}
