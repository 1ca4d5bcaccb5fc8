//! Process wiring: builds collaborators from the CLI, starts the activation
//! source and both loops, and turns ctrl-c into a shutdown trigger.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axis_cli::{validate_cli, Cli, CliActivationMode, CliProvider};
use axis_core::LogRotationPolicy;
use axis_orchestrator::{
    default_greeting, shutdown_channel, start_activation_source, status_channel, ActivationFlag,
    ActivationMode, AnswerGenerator, AssistantState, AutomationDispatcher,
    AutomationDispatcherConfig, Collaborators, ContentWriter, DesktopActions, DisplayRecord,
    IntentClassifier, OrchestrationConfig, OrchestrationLoop, Participants, PresentationLoop,
    SpeechCapture, SpeechRenderer, StatusMirror,
};
use axis_providers::{
    transcript_display_records, CommandImageGenerator, CommandLine, CommandSpeechCapture,
    CommandSpeechRenderer, DesktopPlatform, EchoAnswerGenerator, GeminiAssistant, GeminiClient,
    GeminiConfig, JsonlTranscriptStore, PrefixIntentClassifier, SilentSpeechRenderer,
    StdinSpeechCapture, SystemDesktopActions, WebSearchClient, WebSearchConfig,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::terminal_display::TerminalDisplaySink;

const STARTUP_HISTORY_RECORDS: usize = 6;

pub(crate) struct AssistantWiring {
    pub(crate) collaborators: Collaborators,
    pub(crate) desktop: Arc<dyn DesktopActions>,
    pub(crate) writer: Arc<dyn ContentWriter>,
}

pub(crate) async fn run_assistant(cli: Cli) -> Result<()> {
    validate_cli(&cli)?;
    std::fs::create_dir_all(&cli.state_dir).with_context(|| {
        format!(
            "failed to create state directory {}",
            cli.state_dir.display()
        )
    })?;

    let transcript = Arc::new(JsonlTranscriptStore::new(
        cli.transcript_path(),
        LogRotationPolicy::from_env(),
    ));
    let wiring = build_wiring(&cli, Arc::clone(&transcript))?;

    let (mut publisher, observer) = status_channel(AssistantState::Available);
    if cli.status_mirror {
        publisher = publisher.with_mirror(StatusMirror::new(cli.status_mirror_path()));
    }
    let (shutdown, signal) = shutdown_channel();
    let activation = ActivationFlag::new(false);
    let activation_task = start_activation_source(
        &activation_mode(&cli),
        &activation,
        Duration::from_millis(cli.idle_poll_ms),
        shutdown.signal(),
    );

    let dispatcher = AutomationDispatcher::new(
        wiring.desktop,
        wiring.writer,
        AutomationDispatcherConfig {
            content_dir: cli.content_dir(),
            command_timeout: Duration::from_millis(cli.automation_timeout_ms),
        },
    );
    let orchestration = OrchestrationLoop::new(
        orchestration_config(&cli),
        wiring.collaborators,
        dispatcher,
        publisher,
        activation,
        shutdown.clone(),
    );
    orchestration.publish_records(&startup_records(&cli, &transcript))?;

    let presentation = (!cli.no_presentation).then(|| {
        let presentation = PresentationLoop::new(
            observer,
            Box::new(TerminalDisplaySink::new(std::io::stdout())),
            Duration::from_millis(cli.presentation_poll_ms),
        );
        tokio::spawn(presentation.run(shutdown.signal(), shutdown.clone()))
    });
    let interrupt = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.trigger("interrupt");
            }
        })
    };
    info!(
        provider = ?cli.provider,
        state_dir = %cli.state_dir.display(),
        "assistant started"
    );

    let result = orchestration.run(signal).await;
    shutdown.trigger("orchestration stopped");
    interrupt.abort();
    if let Some(handle) = presentation {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(render_error)) => warn!(
                reason_code = "presentation_stopped_with_error",
                error = %format!("{render_error:#}"),
                "presentation loop failed"
            ),
            Err(join_error) => warn!(
                reason_code = "presentation_task_failed",
                error = %join_error,
                "presentation task ended abnormally"
            ),
        }
    }
    if let Some(handle) = activation_task {
        join_background_task("activation watcher", handle).await;
    }
    info!(
        reason = %shutdown.signal().reason().unwrap_or_default(),
        "assistant stopped"
    );
    result.map_err(Into::into)
}

/// Awaits a background task, logging instead of propagating a panic or
/// cancellation.
pub(crate) async fn join_background_task<T>(task: &'static str, handle: JoinHandle<T>) -> Option<T> {
    match handle.await {
        Ok(value) => Some(value),
        Err(join_error) => {
            warn!(
                reason_code = "background_task_failed",
                task,
                error = %join_error,
                "background task ended abnormally"
            );
            None
        }
    }
}

pub(crate) fn orchestration_config(cli: &Cli) -> OrchestrationConfig {
    OrchestrationConfig {
        username: cli.username.clone(),
        assistant_name: cli.assistant_name.clone(),
        idle_poll: Duration::from_millis(cli.idle_poll_ms),
        shutdown_grace: Duration::from_millis(cli.shutdown_grace_ms),
    }
}

pub(crate) fn activation_mode(cli: &Cli) -> ActivationMode {
    match cli.activation {
        CliActivationMode::Always => ActivationMode::Always,
        CliActivationMode::File => ActivationMode::File(cli.activation_file_path()),
    }
}

/// Recent transcript entries, or the greeting when there are none.
pub(crate) fn startup_records(cli: &Cli, transcript: &JsonlTranscriptStore) -> Vec<DisplayRecord> {
    let participants = Participants {
        username: &cli.username,
        assistant_name: &cli.assistant_name,
    };
    match transcript.recent(STARTUP_HISTORY_RECORDS) {
        Ok(entries) if !entries.is_empty() => transcript_display_records(&entries, participants),
        Ok(_) => default_greeting(participants),
        Err(read_error) => {
            warn!(
                reason_code = "transcript_history_unreadable",
                error = %format!("{read_error:#}"),
                "starting with the default greeting"
            );
            default_greeting(participants)
        }
    }
}

pub(crate) fn build_wiring(
    cli: &Cli,
    transcript: Arc<JsonlTranscriptStore>,
) -> Result<AssistantWiring> {
    let search = if cli.web_search {
        Some(WebSearchClient::new(WebSearchConfig {
            request_timeout_ms: cli.provider_timeout_ms,
            ..WebSearchConfig::default()
        })?)
    } else {
        None
    };

    let (classifier, answers, writer): (
        Arc<dyn IntentClassifier>,
        Arc<dyn AnswerGenerator>,
        Arc<dyn ContentWriter>,
    ) = match cli.provider {
        CliProvider::Offline => {
            let echo = Arc::new(EchoAnswerGenerator {
                assistant_name: cli.assistant_name.clone(),
            });
            (Arc::new(PrefixIntentClassifier), echo.clone(), echo)
        }
        CliProvider::Gemini => {
            let api_key = cli.gemini_api_key.clone().unwrap_or_default();
            let client = GeminiClient::new(GeminiConfig {
                api_base: cli.gemini_api_base.clone(),
                model: cli.gemini_model.clone(),
                request_timeout_ms: cli.provider_timeout_ms,
                ..GeminiConfig::new(api_key)
            })?;
            let mut assistant = GeminiAssistant::new(client, &cli.username, &cli.assistant_name)
                .with_transcript(Arc::clone(&transcript), cli.history_limit);
            if let Some(search) = &search {
                assistant = assistant.with_search(search.clone());
            }
            let assistant = Arc::new(assistant);
            (assistant.clone(), assistant.clone(), assistant)
        }
    };

    let capture: Arc<dyn SpeechCapture> = match optional_command(&cli.capture_command)? {
        Some(command) => Arc::new(CommandSpeechCapture::new(command)),
        None => Arc::new(StdinSpeechCapture::new()?),
    };
    let speech: Arc<dyn SpeechRenderer> = match optional_command(&cli.tts_command)? {
        Some(command) => Arc::new(CommandSpeechRenderer::new(command)),
        None => Arc::new(SilentSpeechRenderer),
    };
    let images = Arc::new(CommandImageGenerator::new(
        &cli.state_dir,
        optional_command(&cli.image_command)?,
    ));
    let desktop = Arc::new(SystemDesktopActions::new(DesktopPlatform::current(), search));

    Ok(AssistantWiring {
        collaborators: Collaborators {
            capture,
            classifier,
            answers,
            speech,
            images,
            transcript,
        },
        desktop,
        writer,
    })
}

fn optional_command(raw: &Option<String>) -> Result<Option<CommandLine>> {
    raw.as_deref()
        .map(|raw| CommandLine::parse(raw).context("invalid external command"))
        .transpose()
}
