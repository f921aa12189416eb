//! `OpenAI`-compatible streaming transport
//!
//! Posts a turn request to `{base_url}/chat/completions` with `stream: true`
//! and hands the response body back as a stream of text lines.

use super::types::ChatRequest;
use super::{LineStream, LlmError, LlmService};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Display;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streaming chat client for the `chat/completions` endpoint
pub struct OpenAIService {
    client: Client,
    api_key: String,
    endpoint: String,
    model_id: String,
}

impl OpenAIService {
    pub fn new(api_key: String, base_url: &str, model_id: String) -> Result<Self, LlmError> {
        // No overall timeout: a round may stream for as long as the model talks.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model_id,
        })
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<LineStream, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read error response: {e}")))?;
            let detail = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map_or_else(|_| body.clone(), |r| r.error.message);
            return Err(LlmError::from_status(status.as_u16(), &detail, body));
        }

        Ok(into_lines(response.bytes_stream()))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Re-chunk a byte stream into `\n`-terminated lines
///
/// Line terminators (`\n` or `\r\n`) are stripped. A trailing line without a
/// terminator is still yielded when the body ends.
pub fn into_lines<S, B, E>(bytes: S) -> LineStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = (Box::pin(bytes), Vec::<u8>::new(), false);
    let lines = futures::stream::unfold(state, |(mut bytes, mut buf, mut exhausted)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buf.drain(..=pos).collect();
                let line = decode_line(&raw);
                return Some((Ok(line), (bytes, buf, exhausted)));
            }
            if exhausted {
                if buf.is_empty() {
                    return None;
                }
                let line = decode_line(&std::mem::take(&mut buf));
                return Some((Ok(line), (bytes, buf, exhausted)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    let err = LlmError::network(format!("Response stream failed: {e}"));
                    buf.clear();
                    return Some((Err(err), (bytes, buf, true)));
                }
                None => exhausted = true,
            }
        }
    });
    Box::pin(lines)
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}
