//! Concrete collaborators for the axis orchestrator: Gemini answers and
//! classification, offline stand-ins, speech adapters, desktop automation,
//! image-generation hand-off, and the NDJSON transcript.

pub mod command_line;
pub mod desktop_actions;
pub mod gemini_assistant;
pub mod gemini_client;
pub mod image_generation;
pub mod offline;
pub mod provider_error;
pub mod speech_io;
pub mod transcript_store;
pub mod web_search;

pub use command_line::CommandLine;
pub use desktop_actions::{video_results_url, DesktopPlatform, SystemDesktopActions};
pub use gemini_assistant::{parse_classifier_reply, realtime_information, GeminiAssistant};
pub use gemini_client::{
    GeminiClient, GeminiConfig, GeminiRole, GeminiTurn, DEFAULT_GEMINI_API_BASE,
    DEFAULT_GEMINI_MODEL,
};
pub use image_generation::{CommandImageGenerator, IMAGE_REQUEST_FILE};
pub use offline::{EchoAnswerGenerator, PrefixIntentClassifier};
pub use provider_error::ProviderError;
pub use speech_io::{
    CommandSpeechCapture, CommandSpeechRenderer, SilentSpeechRenderer, StdinSpeechCapture,
};
pub use transcript_store::{
    transcript_display_records, JsonlTranscriptStore, TranscriptEntry, TranscriptRole,
};
pub use web_search::{WebSearchClient, WebSearchConfig, BROWSER_USER_AGENT};
