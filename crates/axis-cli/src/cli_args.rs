use std::path::PathBuf;

use clap::Parser;

use crate::{CliActivationMode, CliProvider};

const TRANSCRIPT_FILE: &str = "chat_log.jsonl";
const STATUS_MIRROR_FILE: &str = "status.json";
const ACTIVATION_FILE: &str = "mic.data";
const CONTENT_DIR: &str = "content";

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "axis",
    about = "Voice assistant orchestrator: listens, routes intents, answers, and automates the desktop",
    version
)]
pub struct Cli {
    #[arg(long, env = "AXIS_USERNAME", default_value = "User", help = "Name used for the user in prompts and the chat display")]
    pub username: String,

    #[arg(
        long = "assistant-name",
        env = "AXIS_ASSISTANT_NAME",
        default_value = "Axis",
        help = "Name the assistant answers as"
    )]
    pub assistant_name: String,

    #[arg(
        long = "state-dir",
        env = "AXIS_STATE_DIR",
        default_value = ".axis",
        help = "Directory for the transcript, status mirror, generated content, and image requests"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long,
        env = "AXIS_PROVIDER",
        value_enum,
        default_value_t = CliProvider::Offline,
        help = "Answer/classification backend"
    )]
    pub provider: CliProvider,

    #[arg(
        long = "gemini-api-key",
        env = "GEMINI_API_KEY",
        hide_env_values = true,
        help = "API key for --provider gemini"
    )]
    pub gemini_api_key: Option<String>,

    #[arg(
        long = "gemini-model",
        env = "AXIS_GEMINI_MODEL",
        default_value = "gemini-1.5-flash",
        help = "Gemini model name"
    )]
    pub gemini_model: String,

    #[arg(
        long = "gemini-api-base",
        env = "AXIS_GEMINI_API_BASE",
        default_value = "https://generativelanguage.googleapis.com/v1beta",
        help = "Base URL for the Gemini API"
    )]
    pub gemini_api_base: String,

    #[arg(
        long = "provider-timeout-ms",
        env = "AXIS_PROVIDER_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "HTTP timeout for provider and web search requests"
    )]
    pub provider_timeout_ms: u64,

    #[arg(
        long = "history-limit",
        env = "AXIS_HISTORY_LIMIT",
        default_value_t = 12,
        help = "Transcript entries sent as conversational context (0 disables)"
    )]
    pub history_limit: usize,

    #[arg(
        long = "web-search",
        env = "AXIS_WEB_SEARCH",
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Allow scraping search result pages for the open fallback, media lookup, and realtime context"
    )]
    pub web_search: bool,

    #[arg(
        long = "capture-command",
        env = "AXIS_CAPTURE_COMMAND",
        help = "Speech-to-text command printing one utterance on stdout; stdin lines are read when unset"
    )]
    pub capture_command: Option<String>,

    #[arg(
        long = "tts-command",
        env = "AXIS_TTS_COMMAND",
        help = "Text-to-speech command receiving the text as its last argument; speech is silent when unset"
    )]
    pub tts_command: Option<String>,

    #[arg(
        long = "image-command",
        env = "AXIS_IMAGE_COMMAND",
        help = "Image generator command receiving the prompt as its last argument"
    )]
    pub image_command: Option<String>,

    #[arg(
        long,
        env = "AXIS_ACTIVATION",
        value_enum,
        default_value_t = CliActivationMode::Always,
        help = "How listening is armed"
    )]
    pub activation: CliActivationMode,

    #[arg(
        long = "activation-file",
        env = "AXIS_ACTIVATION_FILE",
        help = "File toggled between True/False by an external UI (default: <state-dir>/mic.data)"
    )]
    pub activation_file: Option<PathBuf>,

    #[arg(
        long = "idle-poll-ms",
        env = "AXIS_IDLE_POLL_MS",
        default_value_t = 100,
        help = "Activation poll interval while idle"
    )]
    pub idle_poll_ms: u64,

    #[arg(
        long = "presentation-poll-ms",
        env = "AXIS_PRESENTATION_POLL_MS",
        default_value_t = 50,
        help = "Display refresh interval"
    )]
    pub presentation_poll_ms: u64,

    #[arg(
        long = "automation-timeout-ms",
        env = "AXIS_AUTOMATION_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Per-command limit for automation commands"
    )]
    pub automation_timeout_ms: u64,

    #[arg(
        long = "shutdown-grace-ms",
        env = "AXIS_SHUTDOWN_GRACE_MS",
        default_value_t = 2_000,
        help = "Time outstanding work gets to finish after shutdown starts"
    )]
    pub shutdown_grace_ms: u64,

    #[arg(
        long = "status-mirror",
        env = "AXIS_STATUS_MIRROR",
        default_value_t = false,
        help = "Mirror every status publish to <state-dir>/status.json"
    )]
    pub status_mirror: bool,

    #[arg(
        long = "no-presentation",
        env = "AXIS_NO_PRESENTATION",
        default_value_t = false,
        help = "Do not render the status display on stdout"
    )]
    pub no_presentation: bool,
}

impl Cli {
    pub fn transcript_path(&self) -> PathBuf {
        self.state_dir.join(TRANSCRIPT_FILE)
    }

    pub fn status_mirror_path(&self) -> PathBuf {
        self.state_dir.join(STATUS_MIRROR_FILE)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.state_dir.join(CONTENT_DIR)
    }

    pub fn activation_file_path(&self) -> PathBuf {
        self.activation_file
            .clone()
            .unwrap_or_else(|| self.state_dir.join(ACTIVATION_FILE))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::Cli;
    use crate::{CliActivationMode, CliProvider};

    #[test]
    fn unit_defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["axis"]).expect("parse");
        assert_eq!(cli.username, "User");
        assert_eq!(cli.assistant_name, "Axis");
        assert_eq!(cli.provider, CliProvider::Offline);
        assert_eq!(cli.activation, CliActivationMode::Always);
        assert_eq!(cli.idle_poll_ms, 100);
        assert_eq!(cli.presentation_poll_ms, 50);
        assert_eq!(cli.automation_timeout_ms, 30_000);
        assert_eq!(cli.shutdown_grace_ms, 2_000);
        assert!(!cli.status_mirror);
        assert!(!cli.no_presentation);
    }

    #[test]
    fn functional_state_paths_derive_from_state_dir() {
        let cli = Cli::try_parse_from(["axis", "--state-dir", "/tmp/axis-state"]).expect("parse");
        assert_eq!(
            cli.transcript_path(),
            PathBuf::from("/tmp/axis-state/chat_log.jsonl")
        );
        assert_eq!(
            cli.status_mirror_path(),
            PathBuf::from("/tmp/axis-state/status.json")
        );
        assert_eq!(
            cli.activation_file_path(),
            PathBuf::from("/tmp/axis-state/mic.data")
        );
        assert_eq!(cli.content_dir(), PathBuf::from("/tmp/axis-state/content"));
    }

    #[test]
    fn functional_flags_parse_value_enums_and_switches() {
        let cli = Cli::try_parse_from([
            "axis",
            "--provider",
            "gemini",
            "--activation",
            "file",
            "--activation-file",
            "/tmp/mic",
            "--status-mirror",
            "--no-presentation",
            "--web-search",
            "false",
        ])
        .expect("parse");
        assert_eq!(cli.provider, CliProvider::Gemini);
        assert_eq!(cli.activation, CliActivationMode::File);
        assert_eq!(cli.activation_file_path(), PathBuf::from("/tmp/mic"));
        assert!(cli.status_mirror);
        assert!(cli.no_presentation);
        assert!(!cli.web_search);
    }

    #[test]
    fn regression_zero_provider_timeout_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["axis", "--provider-timeout-ms", "0"]).is_err());
    }
}
