//! Streaming chat transport and response reassembly
//!
//! A round is streamed as event-stream lines. [`frame`] classifies each line,
//! [`combiner`] folds the decoded fragments back into one assistant turn.

pub mod combiner;
mod error;
pub mod frame;
mod openai;
mod types;

#[cfg(test)]
mod proptests;

pub use combiner::{combine, CombineError};
pub use error::{LlmError, LlmErrorKind};
pub use frame::{parse_line, Frame, ParseError};
pub use openai::{OpenAIService, DEFAULT_BASE_URL};
pub use types::*;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Raw response lines of one streamed round
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Common interface for streaming chat endpoints
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Send one turn request and return the response body line by line
    async fn stream_chat(&self, request: &ChatRequest) -> Result<LineStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<LineStream, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.stream_chat(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    tools = request.tools.len(),
                    "LLM stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
