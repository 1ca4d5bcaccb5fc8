//! Speech capture and rendering adapters. Audio itself is delegated to
//! external commands; the defaults use the terminal.

use std::io::BufRead;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axis_orchestrator::{SpeechCapture, SpeechRenderer};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use crate::command_line::CommandLine;

const STDIN_READER_THREAD: &str = "axis-stdin";

/// Reads one utterance per line from stdin. End of input yields `None`.
///
/// Lines are read on a dedicated OS thread and handed over through a
/// channel, so a read that never completes cannot hold up runtime shutdown.
pub struct StdinSpeechCapture {
    lines: AsyncMutex<mpsc::Receiver<std::io::Result<String>>>,
}

impl StdinSpeechCapture {
    pub fn new() -> Result<Self> {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    /// Same as [`StdinSpeechCapture::new`] over any line source.
    pub fn from_reader<R>(reader: R) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(1);
        std::thread::Builder::new()
            .name(STDIN_READER_THREAD.to_string())
            .spawn(move || {
                for line in reader.lines() {
                    let failed = line.is_err();
                    if sender.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            })
            .context("failed to start stdin reader thread")?;
        Ok(Self {
            lines: AsyncMutex::new(receiver),
        })
    }
}

#[async_trait]
impl SpeechCapture for StdinSpeechCapture {
    async fn capture(&self) -> Result<Option<String>> {
        let mut lines = self.lines.lock().await;
        match lines.recv().await {
            Some(line) => Ok(Some(
                line.context("failed to read stdin")?.trim().to_string(),
            )),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
/// Runs a speech-to-text command and takes its stdout as the utterance.
pub struct CommandSpeechCapture {
    command: CommandLine,
}

impl CommandSpeechCapture {
    pub fn new(command: CommandLine) -> Self {
        Self { command }
    }
}

#[async_trait]
impl SpeechCapture for CommandSpeechCapture {
    async fn capture(&self) -> Result<Option<String>> {
        let transcript = self
            .command
            .run_capturing_stdout()
            .await
            .with_context(|| format!("speech capture command '{}' failed", self.command))?;
        Ok(Some(transcript).filter(|text| !text.is_empty()))
    }
}

#[derive(Debug, Clone)]
/// Runs a text-to-speech command with the text as its last argument and
/// waits for it to exit.
pub struct CommandSpeechRenderer {
    command: CommandLine,
}

impl CommandSpeechRenderer {
    pub fn new(command: CommandLine) -> Self {
        Self { command }
    }
}

#[async_trait]
impl SpeechRenderer for CommandSpeechRenderer {
    async fn render(&self, text: &str) -> Result<()> {
        let invocation = self.command.with_trailing_arg(text);
        if !invocation.run_quietly().await {
            bail!("speech command '{}' did not exit cleanly", self.command);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSpeechRenderer;

#[async_trait]
impl SpeechRenderer for SilentSpeechRenderer {
    async fn render(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}
