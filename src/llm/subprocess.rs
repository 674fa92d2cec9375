//! Claude Code and Codex CLI backends.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::ProviderError;

use super::completion::CompletionBackend;
use super::prompt::PromptPair;

/// Check that an executable is on `PATH`.
pub fn is_installed(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Runs `claude -p <prompt> --output-format json`.
pub struct ClaudeCliBackend {
    program: String,
    model: Option<String>,
}

impl ClaudeCliBackend {
    pub fn new(model: Option<String>) -> Self {
        Self {
            program: "claude".to_string(),
            model,
        }
    }

    #[cfg(test)]
    fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            model: None,
        }
    }
}

/// Claude CLI JSON envelope for `--output-format json`.
#[derive(Deserialize)]
struct ClaudeCliResponse {
    result: String,
    #[serde(default)]
    is_error: bool,
}

fn parse_claude_envelope(stdout: &str) -> Result<String, ProviderError> {
    match serde_json::from_str::<ClaudeCliResponse>(stdout) {
        Ok(envelope) if envelope.is_error => Err(ProviderError::InvalidResponse(envelope.result)),
        Ok(envelope) => Ok(envelope.result),
        // Older CLI versions print the bare text.
        Err(_) => Ok(stdout.to_string()),
    }
}

#[async_trait]
impl CompletionBackend for ClaudeCliBackend {
    async fn complete(&self, prompt: &PromptPair) -> Result<String, ProviderError> {
        let mut args = vec![
            "-p".to_string(),
            prompt.combined(),
            "--output-format".to_string(),
            "json".to_string(),
        ];
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        let stdout = run_cli(&self.program, &args).await?;
        parse_claude_envelope(&stdout)
    }
}

/// Runs `codex exec <prompt>`.
pub struct CodexCliBackend {
    program: String,
    model: Option<String>,
}

impl CodexCliBackend {
    pub fn new(model: Option<String>) -> Self {
        Self {
            program: "codex".to_string(),
            model,
        }
    }
}

#[async_trait]
impl CompletionBackend for CodexCliBackend {
    async fn complete(&self, prompt: &PromptPair) -> Result<String, ProviderError> {
        let mut args = vec!["exec".to_string()];
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args.push(prompt.combined());

        run_cli(&self.program, &args).await
    }
}

/// Spawn a provider CLI and return its stdout.
///
/// The child is killed if the calling future is dropped (timeout or
/// cancelled run).
async fn run_cli(program: &str, args: &[String]) -> Result<String, ProviderError> {
    if !is_installed(program) {
        return Err(ProviderError::NotInstalled(program.to_string()));
    }

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(ProviderError::SpawnFailed)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let code = output.status.code().unwrap_or(-1);
        return Err(ProviderError::NonZeroExit { code, stderr });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
