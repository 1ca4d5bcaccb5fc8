//! Last-write-wins status channel between the orchestration loop (sole
//! writer) and any number of observers such as the presentation loop.
//!
//! Each publish swaps in a whole new [`StatusSnapshot`] behind an `ArcSwap`,
//! so readers never block and never see a torn value. An optional
//! [`StatusMirror`] also writes every snapshot to a JSON file with an atomic
//! rename for observers in other processes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use axis_core::{current_unix_timestamp_ms, write_text_atomic};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantState {
    #[default]
    Available,
    Listening,
    Thinking,
    Searching,
    Answering,
    Error,
}

impl AssistantState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Searching => "searching",
            Self::Answering => "answering",
            Self::Error => "error",
        }
    }

    /// User-facing label shown by display sinks.
    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "Available ...",
            Self::Listening => "Listening...",
            Self::Thinking => "Thinking...",
            Self::Searching => "Searching...",
            Self::Answering => "Answering...",
            Self::Error => "Error occurred",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRecord {
    pub speaker: String,
    pub text: String,
}

impl DisplayRecord {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }

    /// Joins several records into one speakerless record, one rendered line
    /// each, so a whole exchange survives the single display slot.
    pub fn block(records: &[DisplayRecord]) -> Self {
        let text = records
            .iter()
            .map(DisplayRecord::rendered)
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(String::new(), text)
    }

    pub fn rendered(&self) -> String {
        if self.speaker.is_empty() {
            return self.text.clone();
        }
        format!("{} : {}", self.speaker, self.text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: AssistantState,
    #[serde(default)]
    pub display: Option<DisplayRecord>,
    /// Incremented on every publish; never reused.
    pub sequence: u64,
    pub updated_unix_ms: u64,
}

impl StatusSnapshot {
    pub fn display_text(&self) -> Option<String> {
        self.display.as_ref().map(DisplayRecord::rendered)
    }
}

#[derive(Debug, Error)]
pub enum StatusChannelError {
    #[error("failed to serialize status snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("status mirror write to {path} failed: {message}")]
    MirrorWrite { path: PathBuf, message: String },
    #[error("status mirror read from {path} failed: {message}")]
    MirrorRead { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Serialize)]
struct StatusMirrorDocument<'a> {
    #[serde(flatten)]
    snapshot: &'a StatusSnapshot,
    state_label: &'static str,
    display_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// File mirror of the channel for cross-process observers.
pub struct StatusMirror {
    path: PathBuf,
}

impl StatusMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, snapshot: &StatusSnapshot) -> Result<(), StatusChannelError> {
        let document = StatusMirrorDocument {
            snapshot,
            state_label: snapshot.state.label(),
            display_text: snapshot.display_text(),
        };
        let encoded = serde_json::to_string_pretty(&document)?;
        write_text_atomic(&self.path, &encoded).map_err(|error| {
            StatusChannelError::MirrorWrite {
                path: self.path.clone(),
                message: format!("{error:#}"),
            }
        })
    }
}

/// Reads the latest snapshot written by a [`StatusMirror`].
pub fn read_status_mirror(path: &Path) -> Result<StatusSnapshot, StatusChannelError> {
    let raw = std::fs::read_to_string(path).map_err(|error| StatusChannelError::MirrorRead {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    Ok(serde_json::from_str::<StatusSnapshot>(&raw)?)
}

/// Creates the channel. The publisher is the only write handle and is not
/// `Clone`; observers can be cloned freely.
pub fn status_channel(initial_state: AssistantState) -> (StatusPublisher, StatusObserver) {
    let slot = Arc::new(ArcSwap::from_pointee(StatusSnapshot {
        state: initial_state,
        display: None,
        sequence: 0,
        updated_unix_ms: current_unix_timestamp_ms(),
    }));
    (
        StatusPublisher {
            slot: Arc::clone(&slot),
            mirror: None,
        },
        StatusObserver { slot },
    )
}

#[derive(Debug)]
pub struct StatusPublisher {
    slot: Arc<ArcSwap<StatusSnapshot>>,
    mirror: Option<StatusMirror>,
}

impl StatusPublisher {
    pub fn with_mirror(mut self, mirror: StatusMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn current(&self) -> Arc<StatusSnapshot> {
        self.slot.load_full()
    }

    pub fn observer(&self) -> StatusObserver {
        StatusObserver {
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn publish(&self, state: AssistantState) -> Result<(), StatusChannelError> {
        self.replace(|snapshot| snapshot.state = state)
    }

    pub fn publish_display(&self, record: DisplayRecord) -> Result<(), StatusChannelError> {
        self.replace(|snapshot| snapshot.display = Some(record))
    }

    /// Publishes only when the current state differs; returns whether it did.
    pub fn publish_if_changed(&self, state: AssistantState) -> Result<bool, StatusChannelError> {
        if self.slot.load().state == state {
            return Ok(false);
        }
        self.publish(state)?;
        Ok(true)
    }

    fn replace(&self, mutate: impl FnOnce(&mut StatusSnapshot)) -> Result<(), StatusChannelError> {
        let mut next = self.slot.load().as_ref().clone();
        mutate(&mut next);
        next.sequence = next.sequence.saturating_add(1);
        next.updated_unix_ms = current_unix_timestamp_ms();
        let next = Arc::new(next);
        self.slot.store(Arc::clone(&next));
        if let Some(mirror) = &self.mirror {
            mirror.write(&next)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StatusObserver {
    slot: Arc<ArcSwap<StatusSnapshot>>,
}

impl StatusObserver {
    pub fn snapshot(&self) -> Arc<StatusSnapshot> {
        self.slot.load_full()
    }

    pub fn observe(&self) -> AssistantState {
        self.slot.load().state
    }

    pub fn observe_display(&self) -> Option<String> {
        self.slot.load().display_text()
    }
}
