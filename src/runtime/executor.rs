//! Conversation runtime executor

use super::traits::{InputSource, OutputSink};
use crate::actions::{ActionRegistry, ReplSessions};
use crate::llm::{
    combine, parse_line, ActionRequest, ChatRequest, CombineError, CombinedMessage, FinishReason,
    Fragment, Frame, LlmError, LlmService, ParseError, ResponseFormat, Transcript, Turn,
};
use crate::state_machine::{
    initial_effects, transition, ConvContext, Effect, Event, LoopState, TransitionError,
};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Fatal conversation failures
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("transport failure: {}", with_body(.0))]
    Transport(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Combine(#[from] CombineError),

    #[error("model requested unknown action {name:?}")]
    UnknownAction { name: String },

    #[error("stream of round {round} ended without the end-of-stream sentinel")]
    TruncatedStream { round: u32 },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("can't read input: {0}")]
    Input(#[from] std::io::Error),
}

fn with_body(error: &LlmError) -> String {
    match &error.body {
        Some(body) if !body.is_empty() => format!("{} (response body: {body})", error.message),
        _ => error.message.clone(),
    }
}

/// Per-request knobs sent with every turn request
#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub model: String,
    pub temperature: f64,
    pub response_format: ResponseFormat,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4-1106-preview".to_string(),
            temperature: 0.7,
            response_format: ResponseFormat::Text,
        }
    }
}

/// Conversation runtime, generic over the transport and the terminal
pub struct ConversationRuntime<L, I, O>
where
    L: LlmService,
    I: InputSource,
    O: OutputSink,
{
    context: ConvContext,
    state: LoopState,
    settings: RequestSettings,
    transcript: Transcript,
    registry: ActionRegistry,
    llm: L,
    input: I,
    output: O,
    /// Interpreter sessions to dispose of when the run ends
    sessions: Option<Arc<ReplSessions>>,
    answer: Option<String>,
}

impl<L, I, O> ConversationRuntime<L, I, O>
where
    L: LlmService,
    I: InputSource,
    O: OutputSink,
{
    pub fn new(
        context: ConvContext,
        settings: RequestSettings,
        transcript: Transcript,
        registry: ActionRegistry,
        llm: L,
        input: I,
        output: O,
    ) -> Self {
        Self {
            state: LoopState::initial(&context),
            context,
            settings,
            transcript,
            registry,
            llm,
            input,
            output,
            sessions: None,
            answer: None,
        }
    }

    /// Dispose of these sessions once the run ends, however it ends
    pub fn with_sessions(mut self, sessions: Arc<ReplSessions>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Run the conversation to its end
    ///
    /// Returns the content of the last non-action round, or `None` if input
    /// closed before any answer.
    pub async fn run(&mut self) -> Result<Option<String>, ConversationError> {
        tracing::info!(
            model = %self.settings.model,
            one_shot = self.context.one_shot,
            actions = self.registry.len(),
            "Starting conversation"
        );

        let outcome = self.drive().await;

        if let Some(sessions) = &self.sessions {
            let live = sessions.count().await;
            if live > 0 {
                tracing::debug!(live, "Disposing repl sessions");
            }
            sessions.shutdown_all().await;
        }

        match &outcome {
            Ok(_) => tracing::info!(turns = self.transcript.len(), "Conversation finished"),
            Err(e) => tracing::error!(error = %e, turns = self.transcript.len(), "Conversation aborted"),
        }
        outcome
    }

    async fn drive(&mut self) -> Result<Option<String>, ConversationError> {
        let mut pending: VecDeque<Effect> = initial_effects(&self.state).into();

        while let Some(effect) = pending.pop_front() {
            if let Some(event) = self.execute_effect(effect).await? {
                let result = transition(&self.state, &self.context, event)?;
                tracing::debug!(from = ?self.state, to = ?result.new_state, "State transition");
                self.state = result.new_state;
                pending.extend(result.effects);
            }
        }

        Ok(self.answer.take())
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, ConversationError> {
        match effect {
            Effect::AppendTurn(turn) => {
                self.transcript.push(turn);
                Ok(None)
            }

            Effect::ReadInput => match self.input.next_turn().await? {
                Some(text) => Ok(Some(Event::UserTurn { text })),
                None => Ok(Some(Event::InputClosed)),
            },

            Effect::RequestModel { round } => {
                let message = self.request_round(round).await?;
                Ok(Some(Event::ModelReplied { message }))
            }

            Effect::DispatchActions { requests } => {
                let results = self.dispatch(&requests).await?;
                Ok(Some(Event::ActionsCompleted { results }))
            }

            Effect::EmitAnswer { content } => {
                self.answer = Some(content);
                Ok(None)
            }
        }
    }

    /// Issue one turn request and reassemble the streamed reply
    async fn request_round(&mut self, round: u32) -> Result<CombinedMessage, ConversationError> {
        let request = ChatRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            stream: true,
            response_format: self.settings.response_format,
            messages: self.transcript.turns().to_vec(),
            tools: self.registry.definitions(),
        };
        tracing::debug!(round, messages = request.messages.len(), "Requesting model round");

        let mut lines = self.llm.stream_chat(&request).await?;
        let mut raw = Vec::new();
        let mut fragments = Vec::new();
        let mut finished = false;

        while let Some(line) = lines.next().await {
            let line = line?;
            let frame = parse_line(&line);
            raw.push(line);
            match frame? {
                Frame::Ignore => {}
                Frame::Done => {
                    finished = true;
                    break;
                }
                Frame::Fragment(fragment) => {
                    self.echo(&fragment);
                    fragments.push(*fragment);
                }
            }
        }
        self.output.end_round();

        if !finished {
            tracing::debug!(round, lines = ?raw, "Stream ended early");
            return Err(ConversationError::TruncatedStream { round });
        }

        let message = combine(&fragments).inspect_err(|e| {
            tracing::debug!(round, error = %e, lines = ?raw, "Failed to combine fragments");
        })?;

        if message.finish == FinishReason::ActionRequested && message.turn.tool_calls.is_empty() {
            tracing::warn!(round, "Model asked for actions but requested none");
        }
        tracing::info!(
            round,
            fragments = fragments.len(),
            finish = message.finish.as_wire(),
            requests = message.turn.tool_calls.len(),
            "Model round complete"
        );
        Ok(message)
    }

    fn echo(&mut self, fragment: &Fragment) {
        let Some(delta) = fragment.delta() else {
            return;
        };
        if let Some(content) = &delta.content {
            self.output.write_delta(content);
        }
        for piece in &delta.tool_calls {
            self.output.write_delta(piece.name());
            self.output.write_delta(piece.arguments());
        }
    }

    /// Execute every request in order, producing one result turn each
    async fn dispatch(&mut self, requests: &[ActionRequest]) -> Result<Vec<Turn>, ConversationError> {
        if let Some(unknown) = requests.iter().find(|r| !self.registry.contains(r.name())) {
            return Err(ConversationError::UnknownAction {
                name: unknown.name().to_string(),
            });
        }

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let name = request.name();
            let Some(action) = self.registry.get_mut(name) else {
                return Err(ConversationError::UnknownAction {
                    name: name.to_string(),
                });
            };

            action.reset();
            let start = std::time::Instant::now();
            let content = match action.load_arguments(request.arguments()) {
                Err(e) => {
                    tracing::warn!(action = %name, id = %request.id, error = %e, "Can't decode action arguments");
                    format!(
                        "can't parse arguments of {name:?}: {e} --- {}",
                        request.arguments()
                    )
                }
                Ok(()) => match action.execute().await {
                    Ok(output) => {
                        tracing::info!(
                            action = %name,
                            id = %request.id,
                            duration_ms = %start.elapsed().as_millis(),
                            "Action completed"
                        );
                        output
                    }
                    Err(e) => {
                        tracing::warn!(action = %name, id = %request.id, error = %e, "Action failed");
                        format!("can't run {name:?}: {e}")
                    }
                },
            };
            action.reset();

            results.push(Turn::action_result(&request.id, name, content));
        }
        Ok(results)
    }
}
