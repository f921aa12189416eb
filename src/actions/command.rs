//! Shell command action
//!
//! Runs `bash -c <line>` to completion and reports the outcome as JSON. A
//! non-zero exit is part of the report, not a failure of the action.

use super::{ActionError, Handler};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::process::Stdio;

pub struct Command;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CommandParams {
    /// Shell command line
    pub line: String,
}

#[derive(Debug, Serialize)]
struct CommandReport {
    error: String,
    exit_code: i32,
    success: bool,
    stderr: String,
    stdout: String,
}

#[async_trait]
impl Handler for Command {
    type Params = CommandParams;

    fn name(&self) -> &'static str {
        "Command"
    }

    fn description(&self) -> &'static str {
        r#"runs a command using "bash -c ....", and returns stdout, stderr, exit code, etc."#
    }

    async fn run(&self, params: &CommandParams) -> Result<String, ActionError> {
        tracing::debug!(line = %params.line, "Running command");
        let output = tokio::process::Command::new("bash")
            .args(["-c", &params.line])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let exit_code = output.status.code().unwrap_or(-1);
        let report = CommandReport {
            error: if output.status.success() {
                String::new()
            } else {
                format!("exit status {exit_code}")
            },
            exit_code,
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        };

        serde_json::to_string(&report).map_err(|e| ActionError::Failed(e.to_string()))
    }
}
