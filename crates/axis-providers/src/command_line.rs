//! External command lines configured as a single shell-style string.

use std::process::Stdio;

use tokio::process::Command;

use crate::provider_error::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Splits `raw` with shell quoting rules. Empty input is rejected.
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let tokens = shell_words::split(raw).map_err(|error| ProviderError::InvalidCommand {
            command: raw.to_string(),
            message: error.to_string(),
        })?;
        let mut tokens = tokens.into_iter();
        let program = tokens
            .next()
            .filter(|program| !program.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidCommand {
                command: raw.to_string(),
                message: "command is empty".to_string(),
            })?;
        Ok(Self {
            program,
            args: tokens.collect(),
        })
    }

    /// Returns a copy with `extra` appended after the configured arguments.
    pub fn with_trailing_arg(&self, extra: &str) -> Self {
        let mut args = self.args.clone();
        args.push(extra.to_string());
        Self {
            program: self.program.clone(),
            args,
        }
    }

    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.kill_on_drop(true);
        command
    }

    /// Runs to completion with output discarded; `true` on a zero exit status.
    pub async fn run_quietly(&self) -> bool {
        let mut command = self.command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match command.status().await {
            Ok(status) => status.success(),
            Err(error) => {
                tracing::debug!(
                    reason_code = "command_spawn_failed",
                    program = %self.program,
                    error = %error,
                    "external command could not be started"
                );
                false
            }
        }
    }

    /// Runs to completion and returns trimmed stdout, failing on non-zero exit.
    pub async fn run_capturing_stdout(&self) -> Result<String, ProviderError> {
        let mut command = self.command();
        command.stdin(Stdio::null());
        let output = command
            .output()
            .await
            .map_err(|error| ProviderError::command_failed(&self.program, error.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::command_failed(
                &self.program,
                format!("exit status {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = vec![self.program.as_str()];
        parts.extend(self.args.iter().map(String::as_str));
        write!(formatter, "{}", shell_words::join(parts))
    }
}
