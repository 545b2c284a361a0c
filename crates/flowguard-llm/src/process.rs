use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::json::extract_json;
use crate::provider::LlmProvider;
use crate::types::{split_system, ChatMessage};
use crate::{LlmError, Result};

// ─── ClaudeCliProvider ────────────────────────────────────────────────────

/// Backend that shells out to the `claude` CLI in single-shot print mode.
///
/// The user turns and the schema are written to stdin; the CLI answers with
/// one JSON result document on stdout whose `result` text holds the object.
/// `CLAUDECODE` is removed from the child environment so this also works when
/// invoked from inside a running Claude session.
#[derive(Debug, Clone)]
pub struct ClaudeCliProvider {
    executable: String,
    model: Option<String>,
}

impl Default for ClaudeCliProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaudeCliProvider {
    pub fn new() -> Self {
        Self {
            executable: "claude".to_string(),
            model: None,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn build_command(&self, system: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("--print").arg("--output-format").arg("json");

        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }

        if let Some(sp) = system {
            cmd.arg("--system-prompt").arg(sp);
        }

        cmd.env_remove("CLAUDECODE");
        cmd
    }

    async fn run_command(mut cmd: Command, prompt: &str) -> Result<String> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| LlmError::Process("stdin not captured".into()))?;
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.flush().await?;
        // Close stdin so the CLI starts processing.
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let msg = match output.status.code() {
                Some(code) if stderr.is_empty() => format!("claude exited with code {code}"),
                Some(code) => format!("claude exited with code {code}\nstderr: {stderr}"),
                None if stderr.is_empty() => "claude terminated by signal".to_string(),
                None => format!("claude terminated by signal\nstderr: {stderr}"),
            };
            return Err(LlmError::Process(msg));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Render the non-system turns plus the schema instruction as one prompt.
fn render_prompt(turns: &[&ChatMessage], schema: &serde_json::Value) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push_str(&turn.content);
        out.push_str("\n\n");
    }
    out.push_str("Respond with a single JSON object and nothing else. ");
    out.push_str("It must conform to this JSON schema:\n");
    out.push_str(&serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string()));
    out.push('\n');
    out
}

#[derive(Debug, Deserialize)]
struct CliResult {
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    result: Option<String>,
}

fn parse_cli_output(stdout: &str) -> Result<serde_json::Value> {
    let trimmed = stdout.trim();
    let doc: CliResult = serde_json::from_str(trimmed).map_err(|source| LlmError::Parse {
        output: trimmed.to_owned(),
        source,
    })?;
    if doc.is_error {
        return Err(LlmError::Process(format!(
            "claude reported an error: {}",
            doc.result.unwrap_or_default()
        )));
    }
    let text = doc
        .result
        .ok_or_else(|| LlmError::Process("claude result had no text".into()))?;
    extract_json(&text)
}

#[async_trait]
impl LlmProvider for ClaudeCliProvider {
    fn name(&self) -> &str {
        "claude_cli"
    }

    async fn generate_structured_value(
        &self,
        messages: &[ChatMessage],
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let (system, turns) = split_system(messages);
        let prompt = render_prompt(&turns, schema);
        let cmd = self.build_command(system.as_deref());
        tracing::debug!(executable = %self.executable, "spawning claude cli");
        let stdout = Self::run_command(cmd, &prompt).await?;
        parse_cli_output(&stdout)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
