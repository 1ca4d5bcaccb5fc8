//! Fork-join execution of an automation batch.
//!
//! Each command runs on its own task with its own primary/fallback chain.
//! `dispatch` is the join barrier: it resolves only after every command has
//! finished, timed out, or crashed, and it reports exactly one
//! [`AutomationOutcome`] per command. A failing command never affects its
//! siblings and never surfaces as an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axis_core::write_text_atomic;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::collaborators::{ContentWriter, DesktopActions};
use crate::decision_token::AutomationVerb;
use crate::intent_router::{AutomationBatch, AutomationCommand};

const GOOGLE_SEARCH_URL: &str = "https://www.google.com/search?q=";
const YOUTUBE_SEARCH_URL: &str = "https://www.youtube.com/results?search_query=";
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
const CONTENT_FILE_FALLBACK_STEM: &str = "content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemAction {
    Mute,
    Unmute,
    VolumeUp,
    VolumeDown,
}

impl SystemAction {
    /// Recognizes exactly mute, unmute, volume up, and volume down (space or
    /// hyphen separated).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', " ");
        let words: Vec<&str> = normalized.split_whitespace().collect();
        match words.as_slice() {
            ["mute"] => Some(Self::Mute),
            ["unmute"] => Some(Self::Unmute),
            ["volume", "up"] => Some(Self::VolumeUp),
            ["volume", "down"] => Some(Self::VolumeDown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationOutcome {
    pub command: AutomationCommand,
    pub succeeded: bool,
    pub used_fallback: bool,
    pub detail: String,
}

impl AutomationOutcome {
    fn primary(command: &AutomationCommand, succeeded: bool, detail: impl Into<String>) -> Self {
        Self {
            command: command.clone(),
            succeeded,
            used_fallback: false,
            detail: detail.into(),
        }
    }

    fn fallback(command: &AutomationCommand, succeeded: bool, detail: impl Into<String>) -> Self {
        Self {
            command: command.clone(),
            succeeded,
            used_fallback: true,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutomationDispatcherConfig {
    /// Directory receiving files produced by `content` commands.
    pub content_dir: PathBuf,
    /// Commands still running after this long are definitively failed.
    pub command_timeout: Duration,
}

impl AutomationDispatcherConfig {
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
        }
    }
}

#[derive(Clone)]
pub struct AutomationDispatcher {
    actions: Arc<dyn DesktopActions>,
    writer: Arc<dyn ContentWriter>,
    config: AutomationDispatcherConfig,
}

impl AutomationDispatcher {
    pub fn new(
        actions: Arc<dyn DesktopActions>,
        writer: Arc<dyn ContentWriter>,
        config: AutomationDispatcherConfig,
    ) -> Self {
        Self {
            actions,
            writer,
            config,
        }
    }

    /// Runs every command concurrently and waits for all of them.
    /// Outcomes come back in the batch's command order.
    pub async fn dispatch(&self, batch: &AutomationBatch) -> Vec<AutomationOutcome> {
        // Tasks live in the set so dropping or aborting this future aborts
        // every command still running.
        let mut tasks = JoinSet::new();
        for (index, command) in batch.commands.iter().enumerate() {
            let dispatcher = self.clone();
            let command = command.clone();
            tasks.spawn(async move { (index, dispatcher.execute_bounded(command).await) });
        }

        let mut slots: Vec<Option<AutomationOutcome>> = vec![None; batch.commands.len()];
        let mut crashes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(join_error) => crashes.push(join_error.to_string()),
            }
        }

        let mut crashes = crashes.into_iter();
        let outcomes: Vec<AutomationOutcome> = batch
            .commands
            .iter()
            .zip(slots)
            .map(|(command, slot)| {
                slot.unwrap_or_else(|| {
                    let reason = crashes
                        .next()
                        .unwrap_or_else(|| "no outcome reported".to_string());
                    warn!(
                        reason_code = "automation_task_crashed",
                        command = %command,
                        error = %reason,
                        "automation task ended without an outcome"
                    );
                    AutomationOutcome::primary(
                        command,
                        false,
                        format!("task ended abnormally: {reason}"),
                    )
                })
            })
            .collect();

        let succeeded = outcomes.iter().filter(|outcome| outcome.succeeded).count();
        info!(
            reason_code = "automation_batch_completed",
            commands = outcomes.len(),
            succeeded,
            failed = outcomes.len().saturating_sub(succeeded),
            "automation batch completed"
        );
        outcomes
    }

    async fn execute_bounded(&self, command: AutomationCommand) -> AutomationOutcome {
        let timeout = self.config.command_timeout;
        match tokio::time::timeout(timeout, self.execute(&command)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    reason_code = "automation_command_timeout",
                    command = %command,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "automation command timed out"
                );
                AutomationOutcome::primary(&command, false, "timed out")
            }
        }
    }

    /// Runs one command's primary/fallback chain.
    pub async fn execute(&self, command: &AutomationCommand) -> AutomationOutcome {
        let argument = command.argument.trim();
        if argument.is_empty() {
            return AutomationOutcome::primary(command, false, "missing argument");
        }
        let outcome = match command.verb {
            AutomationVerb::Open => self.open_app(command, argument).await,
            AutomationVerb::Close => {
                let closed = self.actions.terminate_app(argument).await;
                AutomationOutcome::primary(
                    command,
                    closed,
                    if closed { "closed" } else { "termination failed" },
                )
            }
            AutomationVerb::Play => {
                let played = self.actions.play_media(argument).await;
                AutomationOutcome::primary(
                    command,
                    played,
                    if played { "playing" } else { "playback failed" },
                )
            }
            AutomationVerb::System => match SystemAction::parse(argument) {
                Some(action) => {
                    let applied = self.actions.system_action(action).await;
                    AutomationOutcome::primary(
                        command,
                        applied,
                        if applied { "applied" } else { "system action failed" },
                    )
                }
                None => {
                    debug!(
                        reason_code = "automation_system_unrecognized",
                        argument = %argument,
                        "ignoring unrecognized system command"
                    );
                    AutomationOutcome::primary(command, false, "unrecognized system command")
                }
            },
            AutomationVerb::Content => self.write_content(command, argument).await,
            AutomationVerb::GoogleSearch => {
                self.open_url(command, &search_url(GOOGLE_SEARCH_URL, argument))
                    .await
            }
            AutomationVerb::YoutubeSearch => {
                self.open_url(command, &search_url(YOUTUBE_SEARCH_URL, argument))
                    .await
            }
        };
        debug!(
            reason_code = "automation_command_finished",
            command = %command,
            succeeded = outcome.succeeded,
            used_fallback = outcome.used_fallback,
            detail = %outcome.detail,
            "automation command finished"
        );
        outcome
    }

    async fn open_app(&self, command: &AutomationCommand, name: &str) -> AutomationOutcome {
        if self.actions.launch_app(name).await {
            return AutomationOutcome::primary(command, true, "launched");
        }
        info!(
            reason_code = "automation_open_fallback",
            app = %name,
            "native launch failed; falling back to web search"
        );
        let attempted = self.actions.open_search_fallback(name).await;
        AutomationOutcome::fallback(
            command,
            attempted,
            if attempted {
                "opened web search result"
            } else {
                "web search fallback unavailable"
            },
        )
    }

    async fn open_url(&self, command: &AutomationCommand, url: &str) -> AutomationOutcome {
        let opened = self.actions.open_url(url).await;
        AutomationOutcome::primary(
            command,
            opened,
            if opened {
                url.to_string()
            } else {
                format!("failed to open {url}")
            },
        )
    }

    async fn write_content(&self, command: &AutomationCommand, topic: &str) -> AutomationOutcome {
        let text = match self.writer.write_content(topic).await {
            Ok(text) => text,
            Err(error) => {
                return AutomationOutcome::primary(
                    command,
                    false,
                    format!("content generation failed: {error:#}"),
                )
            }
        };
        let path = content_file_path(&self.config.content_dir, topic);
        if let Err(error) = write_text_atomic(&path, &text) {
            return AutomationOutcome::primary(
                command,
                false,
                format!("content write failed: {error:#}"),
            );
        }
        let opened = self.actions.open_in_viewer(&path).await;
        AutomationOutcome::primary(command, opened, path.display().to_string())
    }
}

fn search_url(base: &str, query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{base}{encoded}")
}

/// `<content_dir>/<topic lowercased with whitespace and separators removed>.txt`.
pub fn content_file_path(content_dir: &Path, topic: &str) -> PathBuf {
    let stem: String = topic
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '-' || *ch == '_')
        .collect();
    let stem = if stem.is_empty() {
        CONTENT_FILE_FALLBACK_STEM.to_string()
    } else {
        stem
    };
    content_dir.join(format!("{stem}.txt"))
}
