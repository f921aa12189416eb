//! Interactive interpreter sessions
//!
//! [`ReplSessions`] is an explicit arena of live interpreter processes keyed
//! by a short generated id. It is shared by the three REPL actions and owned
//! by whoever builds the registry; nothing here is global.

use super::{ActionError, Handler, NoParams};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;

/// Interpreter launch line; stderr carries the prompts, so it is merged
const PYTHON_REPL: &str = "exec python3 -i -u 2>&1";

const PROMPT: &[u8] = b">>> ";

struct ReplSession {
    child: Child,
    stdin: ChildStdin,
    output: BufReader<ChildStdout>,
}

/// Live interpreter sessions by id
pub struct ReplSessions {
    launch: String,
    sessions: Mutex<HashMap<String, Arc<Mutex<ReplSession>>>>,
}

impl Default for ReplSessions {
    fn default() -> Self {
        Self::with_launch(PYTHON_REPL)
    }
}

impl ReplSessions {
    /// Sessions started by running `launch` under `bash -c`
    pub fn with_launch(launch: impl Into<String>) -> Self {
        Self {
            launch: launch.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start a session; returns its id and the greeting printed before the first prompt
    pub async fn create(&self) -> Result<(String, String), ActionError> {
        let mut child = tokio::process::Command::new("bash")
            .args(["-c", &self.launch])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ActionError::Failed("repl pipes unavailable".to_string()));
        };
        let mut session = ReplSession {
            child,
            stdin,
            output: BufReader::new(stdout),
        };

        let greeting = read_until_prompt(&mut session.output, PROMPT).await?;
        let id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();

        tracing::info!(repl = %id, pid = ?session.child.id(), "Started repl");
        self.sessions
            .lock()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        Ok((id, greeting))
    }

    /// Send one command line and collect the output up to the next prompt
    pub async fn round(&self, id: &str, command: &str) -> Result<String, ActionError> {
        let session = self
            .sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ActionError::UnknownRepl(id.to_string()))?;
        let mut session = session.lock().await;

        let line = format!("{}\n", command.trim());
        session.stdin.write_all(line.as_bytes()).await?;
        session.stdin.flush().await?;
        Ok(read_until_prompt(&mut session.output, PROMPT).await?)
    }

    /// Kill a session and forget it
    pub async fn dispose(&self, id: &str) -> Result<(), ActionError> {
        let session = self
            .sessions
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| ActionError::UnknownRepl(id.to_string()))?;
        let mut session = session.lock().await;
        session.child.kill().await?;
        tracing::info!(repl = %id, "Stopped repl");
        Ok(())
    }

    /// Kill every remaining session
    pub async fn shutdown_all(&self) {
        let drained: Vec<_> = self.sessions.lock().await.drain().collect();
        for (id, session) in drained {
            if let Err(e) = session.lock().await.child.kill().await {
                tracing::warn!(repl = %id, error = %e, "Failed to kill repl");
            }
        }
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Read until `prompt` has been seen; the prompt itself is consumed and not returned
pub async fn read_until_prompt<R>(reader: &mut R, prompt: &[u8]) -> io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut out = Vec::new();
    loop {
        let (used, found) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "repl output ended before the prompt",
                ));
            }
            let mut used = 0;
            let mut found = false;
            for &byte in available {
                out.push(byte);
                used += 1;
                if out.ends_with(prompt) {
                    found = true;
                    break;
                }
            }
            (used, found)
        };
        reader.consume(used);

        if found {
            out.truncate(out.len() - prompt.len());
            return Ok(String::from_utf8_lossy(&out).into_owned());
        }
    }
}

pub struct StartRepl {
    sessions: Arc<ReplSessions>,
}

impl StartRepl {
    pub fn new(sessions: Arc<ReplSessions>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Handler for StartRepl {
    type Params = NoParams;

    fn name(&self) -> &'static str {
        "StartREPL"
    }

    fn description(&self) -> &'static str {
        r#"starts a python3 repl as "python3 -i -u"."#
    }

    async fn run(&self, _params: &NoParams) -> Result<String, ActionError> {
        let (id, greeting) = self.sessions.create().await?;
        Ok(format!("{greeting}\n\nrepl id = {id}"))
    }
}

pub struct ReplRound {
    sessions: Arc<ReplSessions>,
}

impl ReplRound {
    pub fn new(sessions: Arc<ReplSessions>) -> Self {
        Self { sessions }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReplRoundParams {
    #[serde(rename = "REPLId")]
    pub repl_id: String,
    #[serde(rename = "Command")]
    pub command: String,
}

#[async_trait]
impl Handler for ReplRound {
    type Params = ReplRoundParams;

    fn name(&self) -> &'static str {
        "REPLRound"
    }

    fn description(&self) -> &'static str {
        "does an i/o round with an existing python repl having the given repl id."
    }

    async fn run(&self, params: &ReplRoundParams) -> Result<String, ActionError> {
        self.sessions.round(&params.repl_id, &params.command).await
    }
}

pub struct StopRepl {
    sessions: Arc<ReplSessions>,
}

impl StopRepl {
    pub fn new(sessions: Arc<ReplSessions>) -> Self {
        Self { sessions }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StopReplParams {
    #[serde(rename = "REPLId")]
    pub repl_id: String,
}

#[async_trait]
impl Handler for StopRepl {
    type Params = StopReplParams;

    fn name(&self) -> &'static str {
        "StopREPL"
    }

    fn description(&self) -> &'static str {
        "stops a python repl having the given repl id."
    }

    async fn run(&self, params: &StopReplParams) -> Result<String, ActionError> {
        self.sessions.dispose(&params.repl_id).await?;
        Ok(format!("repl with id {} stopped.", params.repl_id))
    }
}
