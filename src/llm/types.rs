//! Common types for chat completions
//!
//! The same structs serve the transcript, the outbound request and the
//! streamed fragments, so field names follow the `chat/completions` wire format.

use serde::{Deserialize, Deserializer, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    #[default]
    Assistant,
    /// Result of an action the model asked for
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Name and raw argument text of a requested action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub arguments: String,
}

/// A structured request from the model to invoke a local action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Correlation id; only the first fragment of a streamed request carries it
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(rename = "function", default)]
    pub call: FunctionCall,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "function".to_string(),
            call: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.call.name
    }

    pub fn arguments(&self) -> &str {
        &self.call.arguments
    }
}

/// One role-tagged entry of the transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ActionRequest>,
    /// Set on action-result turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on action-result turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ActionRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, content)
        }
    }

    pub fn action_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }
}

/// Append-only conversation history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }
}

impl FromIterator<Turn> for Transcript {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

/// Declared schema of one registered action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Tool entry of a turn request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ActionSpec,
}

impl From<ActionSpec> for ToolSpec {
    fn from(function: ActionSpec) -> Self {
        Self {
            kind: "function",
            function,
        }
    }
}

/// Response format tag of a turn request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    #[value(name = "json_object")]
    JsonObject,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormatTag {
    #[serde(rename = "type")]
    kind: ResponseFormat,
}

/// One turn request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f64,
    pub stream: bool,
    #[serde(serialize_with = "serialize_format")]
    pub response_format: ResponseFormat,
    pub messages: Vec<Turn>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's serialize_with signature
fn serialize_format<S: serde::Serializer>(
    format: &ResponseFormat,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    ResponseFormatTag { kind: *format }.serialize(serializer)
}

/// Partial turn carried by one streamed choice
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ActionRequest>,
}

/// One choice of a streamed fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// One decoded data event of a streamed round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<FragmentChoice>,
}

impl Fragment {
    /// Delta of the first choice, if any
    pub fn delta(&self) -> Option<&Delta> {
        self.choices.first().map(|c| &c.delta)
    }
}

/// Why the model stopped producing a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    ActionRequested,
    Ended,
    Other(String),
}

impl FinishReason {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "tool_calls" => FinishReason::ActionRequested,
            "stop" => FinishReason::Ended,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            FinishReason::ActionRequested => "tool_calls",
            FinishReason::Ended => "stop",
            FinishReason::Other(raw) => raw,
        }
    }
}

/// A complete assistant turn assembled from one round's fragments
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedMessage {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub index: u32,
    pub turn: Turn,
    pub finish: FinishReason,
}

impl CombinedMessage {
    pub fn requests_actions(&self) -> bool {
        self.finish == FinishReason::ActionRequested
    }
}

/// Treat an explicit JSON `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
