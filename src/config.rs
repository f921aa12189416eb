//! Command-line and environment configuration

use crate::llm::{ResponseFormat, DEFAULT_BASE_URL};
use crate::runtime::RequestSettings;
use clap::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variables consulted for the API key, in order
const KEY_VARS: &[&str] = &["OPENAI_API_KEY", "OPENAI_SECRET_KEY"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API key: pass --key-file or set OPENAI_API_KEY")]
    MissingKey,

    #[error("key file {} is empty", path.display())]
    EmptyKeyFile { path: PathBuf },

    #[error("can't read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// CLI arguments for toolchat
#[derive(Parser, Debug)]
#[command(name = "toolchat")]
#[command(version, about = "Chat with a model that can call local actions")]
#[command(long_about = r"
Streams a chat with an OpenAI-compatible model. The model can ask for local
actions (arithmetic, sorting, files, shell commands, a python REPL); their
results are fed back until it answers.

Each positional PROMPT_FILE is read and sent as a user turn after the
--prompt texts. Without --one-shot, further turns are read from stdin.

Example:
  toolchat -p 'what is 2+2' --one-shot
  toolchat task.md
")]
pub struct Cli {
    /// Files whose contents are sent as user turns
    #[arg(value_name = "PROMPT_FILE")]
    pub prompt_files: Vec<PathBuf>,

    /// Prompt text sent as a user turn (can be specified multiple times)
    #[arg(short, long, value_name = "TEXT")]
    pub prompt: Vec<String>,

    /// Model identifier
    #[arg(long, default_value = "gpt-4-1106-preview")]
    pub model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f64,

    /// Response format requested from the model
    #[arg(long, value_enum, default_value = "text")]
    pub response_format: ResponseFormat,

    /// Base URL of the chat API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// File holding the API key (overrides the environment)
    #[arg(long, value_name = "PATH")]
    pub key_file: Option<PathBuf>,

    /// Answer the seeded prompts and exit without reading stdin
    #[arg(long)]
    pub one_shot: bool,

    /// Jokes file used by the RandomJoke action
    #[arg(long, value_name = "PATH", default_value = "jokes.txt")]
    pub jokes: PathBuf,

    /// Print the whole transcript when the conversation ends
    #[arg(long)]
    pub dump_transcript: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Leave out the standing instructions sent before the prompts
    #[arg(long)]
    pub no_preamble: bool,
}

/// Resolved configuration for one run
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub settings: RequestSettings,
    pub base_url: String,
    pub api_key: String,
    pub one_shot: bool,
    /// User prompts in send order
    pub prompts: Vec<String>,
    pub jokes: PathBuf,
    pub preamble: bool,
    pub dump_transcript: bool,
}

impl ChatConfig {
    /// Resolve from parsed arguments and the process environment
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = resolve_api_key(cli.key_file.as_deref(), env)?;

        let mut prompts = cli.prompt;
        for path in &cli.prompt_files {
            tracing::info!(path = %path.display(), "Adding prompt file");
            prompts.push(read(path)?);
        }

        Ok(Self {
            settings: RequestSettings {
                model: cli.model,
                temperature: cli.temperature,
                response_format: cli.response_format,
            },
            base_url: cli.base_url,
            api_key,
            one_shot: cli.one_shot,
            prompts,
            jokes: cli.jokes,
            preamble: !cli.no_preamble,
            dump_transcript: cli.dump_transcript,
        })
    }
}

/// Key file first, then the environment
fn resolve_api_key(
    key_file: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    if let Some(path) = key_file {
        let key = read(path)?.trim().to_string();
        if key.is_empty() {
            return Err(ConfigError::EmptyKeyFile {
                path: path.to_path_buf(),
            });
        }
        return Ok(key);
    }

    KEY_VARS
        .iter()
        .filter_map(|name| env(name))
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
        .ok_or(ConfigError::MissingKey)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
