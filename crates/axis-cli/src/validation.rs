use anyhow::{bail, Result};

use crate::{Cli, CliActivationMode, CliProvider};

const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const MAX_AUTOMATION_TIMEOUT_MS: u64 = 600_000;
const MAX_SHUTDOWN_GRACE_MS: u64 = 60_000;

/// Rejects option combinations the runtime cannot start with.
pub fn validate_cli(cli: &Cli) -> Result<()> {
    if cli.username.trim().is_empty() {
        bail!("--username cannot be empty");
    }
    if cli.assistant_name.trim().is_empty() {
        bail!("--assistant-name cannot be empty");
    }
    validate_interval("--idle-poll-ms", cli.idle_poll_ms, MAX_POLL_INTERVAL_MS)?;
    validate_interval(
        "--presentation-poll-ms",
        cli.presentation_poll_ms,
        MAX_POLL_INTERVAL_MS,
    )?;
    validate_interval(
        "--automation-timeout-ms",
        cli.automation_timeout_ms,
        MAX_AUTOMATION_TIMEOUT_MS,
    )?;
    if cli.shutdown_grace_ms > MAX_SHUTDOWN_GRACE_MS {
        bail!("--shutdown-grace-ms must be at most {MAX_SHUTDOWN_GRACE_MS}");
    }

    if cli.provider == CliProvider::Gemini {
        let has_key = cli
            .gemini_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !has_key {
            bail!("--provider gemini requires --gemini-api-key (or GEMINI_API_KEY)");
        }
        if cli.gemini_model.trim().is_empty() {
            bail!("--gemini-model cannot be empty");
        }
    }

    for (flag, command) in [
        ("--capture-command", &cli.capture_command),
        ("--tts-command", &cli.tts_command),
        ("--image-command", &cli.image_command),
    ] {
        if command.as_deref().is_some_and(|raw| raw.trim().is_empty()) {
            bail!("{flag} cannot be empty when provided");
        }
    }

    if cli.activation == CliActivationMode::Always && cli.activation_file.is_some() {
        bail!("--activation-file requires --activation file");
    }
    Ok(())
}

fn validate_interval(flag: &str, value: u64, max: u64) -> Result<()> {
    if value == 0 {
        bail!("{flag} must be greater than 0");
    }
    if value > max {
        bail!("{flag} must be at most {max}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::validate_cli;
    use crate::{Cli, CliProvider};

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["axis"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse")
    }

    #[test]
    fn unit_default_cli_is_valid() {
        let mut cli = parse(&[]);
        cli.provider = CliProvider::Offline;
        validate_cli(&cli).expect("defaults validate");
    }

    #[test]
    fn functional_gemini_without_key_is_rejected() {
        let mut cli = parse(&["--provider", "gemini"]);
        cli.gemini_api_key = None;
        let error = validate_cli(&cli).expect_err("missing key");
        assert!(error.to_string().contains("--gemini-api-key"));

        cli.gemini_api_key = Some("   ".to_string());
        assert!(validate_cli(&cli).is_err());

        cli.gemini_api_key = Some("key-123".to_string());
        validate_cli(&cli).expect("key present");
    }

    #[test]
    fn functional_zero_and_oversized_intervals_are_rejected() {
        let cli = parse(&["--idle-poll-ms", "0"]);
        assert!(validate_cli(&cli)
            .expect_err("zero")
            .to_string()
            .contains("--idle-poll-ms"));

        let cli = parse(&["--presentation-poll-ms", "120000"]);
        assert!(validate_cli(&cli).is_err());

        let cli = parse(&["--automation-timeout-ms", "0"]);
        assert!(validate_cli(&cli).is_err());

        let cli = parse(&["--shutdown-grace-ms", "0"]);
        validate_cli(&cli).expect("zero grace is allowed");
    }

    #[test]
    fn regression_blank_external_command_is_rejected() {
        let cli = parse(&["--tts-command", "  "]);
        let error = validate_cli(&cli).expect_err("blank command");
        assert!(error.to_string().contains("--tts-command"));
    }

    #[test]
    fn regression_activation_file_requires_file_mode() {
        let cli = parse(&["--activation-file", "/tmp/mic"]);
        assert!(validate_cli(&cli).is_err());
        let cli = parse(&["--activation", "file", "--activation-file", "/tmp/mic"]);
        validate_cli(&cli).expect("file mode");
    }
}
