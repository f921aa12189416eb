//! toolchat - streaming chat client with local actions
//!
//! Streams a conversation with an OpenAI-compatible model, reassembles each
//! streamed reply and runs the local actions the model asks for until it
//! answers.

mod actions;
mod config;
mod llm;
mod runtime;
mod state_machine;
mod system_prompt;

use actions::{ActionRegistry, ReplSessions};
use clap::Parser;
use config::{ChatConfig, Cli};
use llm::{LlmService, LoggingService, OpenAIService};
use runtime::{ConversationRuntime, StdinInput, StdoutSink};
use state_machine::ConvContext;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

const DEFAULT_LOG_FILTER: &str = "toolchat=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = ChatConfig::from_cli(cli)?;

    let service = OpenAIService::new(
        config.api_key.clone(),
        &config.base_url,
        config.settings.model.clone(),
    )?;
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(service)));
    tracing::info!(model = %llm.model_id(), base_url = %config.base_url, "LLM client initialized");

    let sessions = Arc::new(ReplSessions::default());
    let registry = ActionRegistry::standard(sessions.clone(), config.jokes.clone())?;
    let transcript =
        system_prompt::opening_transcript(config.preamble, config.prompts.iter().cloned());

    let mut runtime = ConversationRuntime::new(
        ConvContext::new(config.one_shot),
        config.settings.clone(),
        transcript,
        registry,
        llm,
        StdinInput::new(),
        StdoutSink,
    )
    .with_sessions(sessions);

    let outcome = runtime.run().await;

    if config.dump_transcript {
        println!();
        for turn in runtime.transcript().turns() {
            println!("{}: {}", turn.role.as_str(), turn.content);
        }
    }

    outcome?;
    Ok(())
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let fmt = if json {
        fmt.json()
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        fmt.compact().boxed()
    };

    tracing_subscriber::registry().with(filter).with(fmt).init();
}
