//! Opening turns of a conversation
//!
//! Every conversation starts with the system turn, optionally followed by a
//! short preamble of standing instructions, then the caller's own prompts as
//! user turns.

use crate::llm::{Transcript, Turn};

/// Base system prompt establishing the assistant's role
const BASE_PROMPT: &str = r"You are a helpful assistant.
If the user asks about their machine or system, you have a function which can execute commands; use it carefully and never in a way that harms the system.
Prefer python3 for calculations, writing scripts to /tmp/ first and running them from there. Install whatever libraries are needed.
Command output you echo to the user's terminal does not need to be repeated in your answer.";

/// Standing instructions sent as leading user turns
const PREAMBLE: &[&str] = &[
    "Don't repeat a command's output if it was already echoed to the terminal.",
    "Your context window is limited, so keep command output small: cap anything you print at about 10k bytes.",
    "Work in small steps. State a plan first, recap it between code blocks, run a little code, inspect the result, then continue.",
];

/// Build the opening transcript
pub fn opening_transcript(with_preamble: bool, prompts: impl IntoIterator<Item = String>) -> Transcript {
    let mut transcript = Transcript::new();
    transcript.push(Turn::system(BASE_PROMPT));
    if with_preamble {
        for line in PREAMBLE {
            transcript.push(Turn::user(*line));
        }
    }
    for prompt in prompts {
        if prompt.trim().is_empty() {
            tracing::debug!("Skipping blank prompt");
            continue;
        }
        transcript.push(Turn::user(prompt));
    }
    transcript
}
