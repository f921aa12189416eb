//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::llm::{ChatRequest, LineStream, LlmError, LlmService};
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Source of user turns
#[async_trait]
pub trait InputSource: Send {
    /// Next line of user input, or `None` once input is closed
    async fn next_turn(&mut self) -> io::Result<Option<String>>;
}

/// Where streamed output is shown
pub trait OutputSink: Send {
    /// Text of one arriving fragment
    fn write_delta(&mut self, text: &str);

    /// The current round's stream has ended
    fn end_round(&mut self);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmService + ?Sized> LlmService for Arc<T> {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<LineStream, LlmError> {
        (**self).stream_chat(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ============================================================================
// Terminal implementations
// ============================================================================

/// Reads user turns from stdin, one per line
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn next_turn(&mut self) -> io::Result<Option<String>> {
        {
            let mut stdout = io::stdout().lock();
            write!(stdout, "> ")?;
            stdout.flush()?;
        }
        let line = self.lines.next_line().await?;
        if line.is_none() {
            println!();
        }
        Ok(line)
    }
}

/// Streams deltas straight to stdout
#[derive(Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_delta(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        // Echo is best-effort
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn end_round(&mut self) {
        println!();
    }
}
