//! Local actions the model can request
//!
//! Every action exposes the same contract: describe itself, drop any
//! previously loaded arguments, load the arguments of one request, execute.
//! Actions are written as [`Handler`]s over a typed parameter struct and
//! wrapped in a [`TypedAction`] slot that owns the loaded arguments between
//! `load_arguments` and `execute`.

mod arithmetic;
mod command;
mod files;
mod joke;
pub mod repl;
mod sorting;
mod views;

pub use arithmetic::{ProductRequest, SquareRoot, SummationRequest};
pub use command::Command;
pub use files::FileCreation;
pub use joke::RandomJoke;
pub use repl::{ReplRound, ReplSessions, StartRepl, StopRepl};
pub use sorting::{NumberSorter, TextSorter};
pub use views::YoutubeViewModel;

use crate::llm::{ActionSpec, ToolSpec};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Failure while executing a loaded action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("no arguments loaded")]
    NotLoaded,

    #[error("no such repl: {0}")]
    UnknownRepl(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("action {0:?} is already registered")]
    Duplicate(String),
}

/// Uniform contract of a registered action
#[async_trait]
pub trait Action: Send + Sync {
    /// Name, description and reflected parameter schema
    fn describe(&self) -> ActionSpec;

    /// Forget the arguments of any previous invocation
    fn reset(&mut self);

    /// Decode the raw argument text of one request
    fn load_arguments(&mut self, raw: &str) -> Result<(), serde_json::Error>;

    async fn execute(&self) -> Result<String, ActionError>;
}

/// The behaviour of one action over its typed parameters
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Params: DeserializeOwned + JsonSchema + Send + Sync;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn run(&self, params: &Self::Params) -> Result<String, ActionError>;
}

/// Parameter type of actions that take no arguments
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoParams {}

/// Argument slot adapting a [`Handler`] to the [`Action`] contract
pub struct TypedAction<H: Handler> {
    handler: H,
    params: Option<H::Params>,
}

impl<H: Handler> TypedAction<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            params: None,
        }
    }
}

#[async_trait]
impl<H: Handler> Action for TypedAction<H> {
    fn describe(&self) -> ActionSpec {
        ActionSpec {
            name: self.handler.name().to_string(),
            description: self.handler.description().to_string(),
            parameters: parameter_schema::<H::Params>(),
        }
    }

    fn reset(&mut self) {
        self.params = None;
    }

    fn load_arguments(&mut self, raw: &str) -> Result<(), serde_json::Error> {
        let raw = if raw.trim().is_empty() { "{}" } else { raw };
        match serde_json::from_str(raw) {
            Ok(params) => {
                self.params = Some(params);
                Ok(())
            }
            Err(e) => {
                self.params = None;
                Err(e)
            }
        }
    }

    async fn execute(&self) -> Result<String, ActionError> {
        let params = self.params.as_ref().ok_or(ActionError::NotLoaded)?;
        self.handler.run(params).await
    }
}

/// Reflect the JSON schema of a parameter type as the model expects it
fn parameter_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value =
        serde_json::to_value(schema).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object
            .entry("type")
            .or_insert_with(|| Value::String("object".to_string()));
        object
            .entry("properties")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    value
}

/// Collection of actions available to a conversation
///
/// Lookup is by name; declaration order is registration order.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<(String, Box<dyn Action>)>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in action
    pub fn standard(repls: Arc<ReplSessions>, jokes: PathBuf) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(TypedAction::new(SummationRequest))?;
        registry.register(TypedAction::new(ProductRequest))?;
        registry.register(TypedAction::new(SquareRoot))?;
        registry.register(TypedAction::new(TextSorter))?;
        registry.register(TypedAction::new(NumberSorter))?;
        registry.register(TypedAction::new(FileCreation))?;
        registry.register(TypedAction::new(RandomJoke::new(jokes)))?;
        registry.register(TypedAction::new(Command))?;
        registry.register(TypedAction::new(YoutubeViewModel))?;
        registry.register(TypedAction::new(StartRepl::new(repls.clone())))?;
        registry.register(TypedAction::new(ReplRound::new(repls.clone())))?;
        registry.register(TypedAction::new(StopRepl::new(repls)))?;
        Ok(registry)
    }

    pub fn register(&mut self, action: impl Action + 'static) -> Result<(), RegistryError> {
        let name = action.describe().name;
        if self.contains(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(action = %name, "Registered action");
        self.actions.push((name, Box::new(action)));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.iter().any(|(n, _)| n == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Action + 'static)> {
        self.actions
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, action)| action.as_mut())
    }

    /// Declared schemas, in registration order
    pub fn definitions(&self) -> Vec<ToolSpec> {
        self.actions
            .iter()
            .map(|(_, a)| ToolSpec::from(a.describe()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
