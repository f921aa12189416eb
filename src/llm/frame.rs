//! Event-stream line decoding
//!
//! Each wire line of a streamed round is either noise, the end-of-stream
//! sentinel, or a data event carrying one JSON [`Fragment`].

use super::types::Fragment;
use thiserror::Error;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Classification of one wire line
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Blank line, comment, or a non-data field
    Ignore,
    /// End of the round
    Done,
    Fragment(Box<Fragment>),
}

/// A data event whose payload is not a valid fragment
#[derive(Debug, Error)]
#[error("malformed stream frame: {source} (payload: {payload})")]
pub struct ParseError {
    pub payload: String,
    #[source]
    pub source: serde_json::Error,
}

/// Decode one line of the event stream
pub fn parse_line(line: &str) -> Result<Frame, ParseError> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(Frame::Ignore);
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload.trim_end() == DONE_SENTINEL {
        return Ok(Frame::Done);
    }

    serde_json::from_str::<Fragment>(payload)
        .map(|fragment| Frame::Fragment(Box::new(fragment)))
        .map_err(|source| ParseError {
            payload: payload.to_string(),
            source,
        })
}
