//! Ports for the external collaborators the orchestration core drives.
//!
//! None of these carry orchestration logic: each one calls out to a service,
//! a device, or the operating system and returns text, audio completion, or a
//! success flag. Adapters live in `axis-providers`; tests script them inline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::automation_dispatcher::SystemAction;
use crate::conversation::ConversationTurn;
use crate::status_channel::StatusChannelError;

#[async_trait]
/// Maps an utterance to ordered raw decision tokens.
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, utterance: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer_general(&self, query: &str) -> Result<String>;

    /// Same shape as [`AnswerGenerator::answer_general`], consulting live data.
    async fn answer_realtime(&self, query: &str) -> Result<String>;
}

#[async_trait]
/// Writes long-form content (letters, essays) for the `content` command.
pub trait ContentWriter: Send + Sync {
    async fn write_content(&self, topic: &str) -> Result<String>;
}

#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// `Ok(None)` means nothing was heard.
    async fn capture(&self) -> Result<Option<String>>;
}

#[async_trait]
pub trait SpeechRenderer: Send + Sync {
    /// Resolves once playback has finished.
    async fn render(&self, text: &str) -> Result<()>;
}

#[async_trait]
/// Hands an image prompt to an external generator without awaiting images.
pub trait ImageGenerator: Send + Sync {
    async fn request_image(&self, prompt: &str) -> Result<()>;

    async fn shutdown(&self, _grace: Duration) {}
}

#[async_trait]
/// Durable chat log owned outside the core.
pub trait TranscriptSink: Send + Sync {
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()>;
}

#[async_trait]
/// Operating-system side effects used by automation commands.
pub trait DesktopActions: Send + Sync {
    async fn launch_app(&self, name: &str) -> bool;

    async fn terminate_app(&self, name: &str) -> bool;

    /// Web-searches `name` and opens the first result. `false` when nothing
    /// could be attempted.
    async fn open_search_fallback(&self, name: &str) -> bool;

    async fn open_url(&self, url: &str) -> bool;

    async fn play_media(&self, query: &str) -> bool;

    async fn system_action(&self, action: SystemAction) -> bool;

    async fn open_in_viewer(&self, path: &std::path::Path) -> bool;
}

#[derive(Clone)]
/// Collaborators consumed by one orchestration loop.
pub struct Collaborators {
    pub capture: Arc<dyn SpeechCapture>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub answers: Arc<dyn AnswerGenerator>,
    pub speech: Arc<dyn SpeechRenderer>,
    pub images: Arc<dyn ImageGenerator>,
    pub transcript: Arc<dyn TranscriptSink>,
}

#[derive(Debug, Error)]
/// Cycle-level failures. Automation command failures never appear here; they
/// are reported per command as outcomes.
pub enum OrchestrationError {
    #[error("speech capture failed: {0}")]
    CaptureFailure(String),
    #[error("intent classification failed: {0}")]
    ClassificationFailure(String),
    #[error("answer generation failed: {0}")]
    AnswerGenerationFailure(String),
    #[error("speech rendering failed: {0}")]
    SpeechRenderFailure(String),
    #[error(transparent)]
    StatusChannel(#[from] StatusChannelError),
}

impl OrchestrationError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::CaptureFailure(_) => "cycle_capture_failed",
            Self::ClassificationFailure(_) => "cycle_classification_failed",
            Self::AnswerGenerationFailure(_) => "cycle_answer_generation_failed",
            Self::SpeechRenderFailure(_) => "cycle_speech_render_failed",
            Self::StatusChannel(_) => "status_channel_io_failed",
        }
    }

    /// Only status-channel I/O ends the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StatusChannel(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CaptureFailure(_) => "Sorry, I could not hear that. Please try again.",
            Self::ClassificationFailure(_) => {
                "Sorry, I could not understand that request. Please try again."
            }
            Self::AnswerGenerationFailure(_) => {
                "Sorry, I could not get an answer right now. Please try again."
            }
            Self::SpeechRenderFailure(_) => "Sorry, I could not speak the answer.",
            Self::StatusChannel(_) => "Status channel unavailable.",
        }
    }
}
