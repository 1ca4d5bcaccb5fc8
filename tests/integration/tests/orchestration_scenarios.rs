use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axis_core::LogRotationPolicy;
use axis_orchestrator::{
    read_status_mirror, shutdown_channel, status_channel, ActivationFlag, AnswerGenerator,
    AssistantState, AutomationDispatcher, AutomationDispatcherConfig, Collaborators,
    ContentWriter, ConversationTurn, CycleOutcome, DesktopActions, ImageGenerator,
    IntentClassifier, OrchestrationConfig, OrchestrationLoop, RoutedIntent, ShutdownController,
    SpeechCapture, SpeechRenderer, StatusMirror, StatusObserver, StatusPublisher, SystemAction,
    TranscriptSink,
};
use axis_providers::{
    EchoAnswerGenerator, JsonlTranscriptStore, PrefixIntentClassifier, TranscriptRole,
};

const STEP_DELAY: Duration = Duration::from_millis(25);

/// Collaborator stand-in with fixed classifier output and slow answer steps,
/// so a polling observer can see every state.
struct ScriptedAssistant {
    utterances: Mutex<VecDeque<String>>,
    tokens: Vec<String>,
    realtime_queries: Mutex<Vec<String>>,
    general_queries: Mutex<Vec<String>>,
    spoken: Mutex<Vec<(String, bool)>>,
    turns: Mutex<Vec<ConversationTurn>>,
    shutdown: Mutex<Option<ShutdownController>>,
}

impl ScriptedAssistant {
    fn new(utterance: &str, tokens: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            utterances: Mutex::new(VecDeque::from([utterance.to_string()])),
            tokens: tokens.iter().map(|token| token.to_string()).collect(),
            realtime_queries: Mutex::new(Vec::new()),
            general_queries: Mutex::new(Vec::new()),
            spoken: Mutex::new(Vec::new()),
            turns: Mutex::new(Vec::new()),
            shutdown: Mutex::new(None),
        })
    }

    fn watch_shutdown(&self, controller: ShutdownController) {
        *self.shutdown.lock().expect("lock") = Some(controller);
    }
}

#[async_trait]
impl SpeechCapture for ScriptedAssistant {
    async fn capture(&self) -> Result<Option<String>> {
        Ok(self.utterances.lock().expect("lock").pop_front())
    }
}

#[async_trait]
impl IntentClassifier for ScriptedAssistant {
    async fn classify(&self, _utterance: &str) -> Result<Vec<String>> {
        tokio::time::sleep(STEP_DELAY).await;
        Ok(self.tokens.clone())
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedAssistant {
    async fn answer_general(&self, query: &str) -> Result<String> {
        self.general_queries
            .lock()
            .expect("lock")
            .push(query.to_string());
        tokio::time::sleep(STEP_DELAY).await;
        Ok(format!("General: {query}"))
    }

    async fn answer_realtime(&self, query: &str) -> Result<String> {
        self.realtime_queries
            .lock()
            .expect("lock")
            .push(query.to_string());
        tokio::time::sleep(STEP_DELAY).await;
        Ok("It is sunny in Paris.".to_string())
    }
}

#[async_trait]
impl SpeechRenderer for ScriptedAssistant {
    async fn render(&self, text: &str) -> Result<()> {
        let shutdown_already_triggered = self
            .shutdown
            .lock()
            .expect("lock")
            .as_ref()
            .is_some_and(ShutdownController::is_triggered);
        self.spoken
            .lock()
            .expect("lock")
            .push((text.to_string(), shutdown_already_triggered));
        tokio::time::sleep(STEP_DELAY).await;
        Ok(())
    }
}

#[async_trait]
impl ImageGenerator for ScriptedAssistant {
    async fn request_image(&self, _prompt: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl TranscriptSink for ScriptedAssistant {
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        self.turns.lock().expect("lock").push(turn.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingDesktop {
    launched: Mutex<Vec<String>>,
    viewed: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl DesktopActions for RecordingDesktop {
    async fn launch_app(&self, name: &str) -> bool {
        self.launched.lock().expect("lock").push(name.to_string());
        true
    }

    async fn terminate_app(&self, _name: &str) -> bool {
        true
    }

    async fn open_search_fallback(&self, _name: &str) -> bool {
        false
    }

    async fn open_url(&self, _url: &str) -> bool {
        true
    }

    async fn play_media(&self, _query: &str) -> bool {
        true
    }

    async fn system_action(&self, _action: SystemAction) -> bool {
        true
    }

    async fn open_in_viewer(&self, path: &Path) -> bool {
        self.viewed.lock().expect("lock").push(path.to_path_buf());
        true
    }
}

struct Harness {
    orchestration: OrchestrationLoop,
    observer: StatusObserver,
    shutdown: ShutdownController,
    desktop: Arc<RecordingDesktop>,
}

fn scripted_collaborators(script: &Arc<ScriptedAssistant>) -> Collaborators {
    Collaborators {
        capture: script.clone(),
        classifier: script.clone(),
        answers: script.clone(),
        speech: script.clone(),
        images: script.clone(),
        transcript: script.clone(),
    }
}

fn harness(
    collaborators: Collaborators,
    writer: Arc<dyn ContentWriter>,
    publisher: StatusPublisher,
    content_dir: &Path,
) -> Harness {
    let observer = publisher.observer();
    let desktop = Arc::new(RecordingDesktop::default());
    let dispatcher = AutomationDispatcher::new(
        desktop.clone(),
        writer,
        AutomationDispatcherConfig::new(content_dir),
    );
    let (shutdown, _signal) = shutdown_channel();
    let orchestration = OrchestrationLoop::new(
        OrchestrationConfig {
            username: "Ada".to_string(),
            idle_poll: Duration::from_millis(5),
            ..OrchestrationConfig::default()
        },
        collaborators,
        dispatcher,
        publisher,
        ActivationFlag::new(true),
        shutdown.clone(),
    );
    Harness {
        orchestration,
        observer,
        shutdown,
        desktop,
    }
}

/// Records each distinct state an observer sees until `stop` is set.
fn spawn_state_poller(
    observer: StatusObserver,
    stop: Arc<std::sync::atomic::AtomicBool>,
) -> tokio::task::JoinHandle<Vec<AssistantState>> {
    tokio::spawn(async move {
        let mut seen: Vec<AssistantState> = Vec::new();
        while !stop.load(std::sync::atomic::Ordering::SeqCst) {
            let state = observer.observe();
            if seen.last() != Some(&state) {
                seen.push(state);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let state = observer.observe();
        if seen.last() != Some(&state) {
            seen.push(state);
        }
        seen
    })
}

fn is_subsequence(observed: &[AssistantState], expected: &[AssistantState]) -> bool {
    let mut expected = expected.iter();
    observed
        .iter()
        .all(|state| expected.any(|candidate| candidate == state))
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn integration_realtime_answer_and_automation_share_one_cycle() {
    let temp = tempfile::tempdir().expect("tempdir");
    let script = ScriptedAssistant::new(
        "what is the weather in Paris and open spotify",
        &["realtime weather in Paris", "open spotify"],
    );
    let (publisher, _observer) = status_channel(AssistantState::Available);
    let mut harness = harness(
        scripted_collaborators(&script),
        Arc::new(EchoAnswerGenerator::default()),
        publisher,
        temp.path(),
    );
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let poller = spawn_state_poller(harness.observer.clone(), stop.clone());

    let outcome = harness.orchestration.run_cycle().await.expect("cycle");
    tokio::time::sleep(Duration::from_millis(10)).await;
    stop.store(true, std::sync::atomic::Ordering::SeqCst);
    let seen = poller.await.expect("poller");

    let CycleOutcome::Completed(turn) = outcome else {
        panic!("expected a completed cycle");
    };
    assert_eq!(
        turn.intents,
        vec![
            RoutedIntent::AutomationBatch {
                commands: vec![axis_orchestrator::AutomationCommand::new(
                    axis_orchestrator::AutomationVerb::Open,
                    "spotify"
                )]
            },
            RoutedIntent::RealtimeQuery {
                text: "weather in Paris".to_string()
            },
        ]
    );
    assert_eq!(script.realtime_queries.lock().expect("lock").len(), 1);
    assert!(script.general_queries.lock().expect("lock").is_empty());

    let from_thinking: Vec<AssistantState> = seen
        .iter()
        .copied()
        .skip_while(|state| *state != AssistantState::Thinking)
        .collect();
    assert!(from_thinking.contains(&AssistantState::Thinking));
    assert!(
        is_subsequence(
            &from_thinking,
            &[
                AssistantState::Thinking,
                AssistantState::Searching,
                AssistantState::Answering,
                AssistantState::Available,
            ]
        ),
        "unexpected state order: {from_thinking:?}"
    );
    assert_eq!(harness.observer.observe(), AssistantState::Available);

    let desktop = harness.desktop.clone();
    assert!(
        wait_for(|| desktop.launched.lock().expect("lock").as_slice() == ["spotify"]).await,
        "automation batch did not launch spotify"
    );
}

#[tokio::test]
async fn integration_exit_renders_farewell_before_shutdown() {
    let temp = tempfile::tempdir().expect("tempdir");
    let script = ScriptedAssistant::new("bye", &["exit"]);
    let (publisher, _observer) = status_channel(AssistantState::Available);
    let harness = harness(
        scripted_collaborators(&script),
        Arc::new(EchoAnswerGenerator::default()),
        publisher,
        temp.path(),
    );
    script.watch_shutdown(harness.shutdown.clone());
    let signal = harness.shutdown.signal();
    let observer = harness.observer.clone();

    tokio::time::timeout(Duration::from_secs(5), harness.orchestration.run(signal))
        .await
        .expect("loop stops after exit")
        .expect("clean stop");

    assert_eq!(
        harness.shutdown.signal().reason().as_deref(),
        Some("exit requested")
    );
    let spoken = script.spoken.lock().expect("lock").clone();
    assert_eq!(spoken.len(), 1);
    let (farewell, shutdown_was_triggered) = &spoken[0];
    assert!(farewell.starts_with("General:"));
    assert!(!shutdown_was_triggered);
    assert_eq!(
        observer.observe_display().as_deref(),
        Some(format!("Axis : {farewell}").as_str())
    );
    let turns = script.turns.lock().expect("lock");
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].intents, vec![RoutedIntent::ExitRequest]);
}

#[tokio::test]
async fn integration_empty_classification_is_a_quiet_no_op() {
    let temp = tempfile::tempdir().expect("tempdir");
    let script = ScriptedAssistant::new("hmm", &[]);
    let (publisher, _observer) = status_channel(AssistantState::Available);
    let mut harness = harness(
        scripted_collaborators(&script),
        Arc::new(EchoAnswerGenerator::default()),
        publisher,
        temp.path(),
    );

    let outcome = harness.orchestration.run_cycle().await.expect("cycle");

    let turn = outcome.turn().expect("turn recorded");
    assert!(turn.intents.is_empty());
    assert!(turn.answer.is_none());
    assert!(script.spoken.lock().expect("lock").is_empty());
    assert!(script.general_queries.lock().expect("lock").is_empty());
    assert!(harness.desktop.launched.lock().expect("lock").is_empty());
    assert_eq!(harness.orchestration.pending_batch_count(), 0);
    assert_eq!(harness.observer.observe(), AssistantState::Available);
}

#[tokio::test]
async fn integration_status_mirror_tracks_latest_snapshot() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mirror_path = temp.path().join("status.json");
    let script = ScriptedAssistant::new("who wrote hamlet", &["general who wrote hamlet"]);
    let (publisher, _observer) = status_channel(AssistantState::Available);
    let publisher = publisher.with_mirror(StatusMirror::new(&mirror_path));
    let mut harness = harness(
        scripted_collaborators(&script),
        Arc::new(EchoAnswerGenerator::default()),
        publisher,
        temp.path(),
    );

    harness.orchestration.run_cycle().await.expect("cycle");

    let mirrored = read_status_mirror(&mirror_path).expect("mirror readable");
    let live = harness.observer.snapshot();
    assert_eq!(mirrored.state, AssistantState::Available);
    assert_eq!(mirrored.sequence, live.sequence);
    assert_eq!(mirrored.display_text(), live.display_text());
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&mirror_path).expect("read"))
            .expect("mirror is json");
    assert!(raw.get("state").is_some());
}

#[tokio::test]
async fn integration_offline_providers_write_content_and_transcript() {
    let temp = tempfile::tempdir().expect("tempdir");
    let content_dir = temp.path().join("content");
    let transcript = Arc::new(JsonlTranscriptStore::new(
        temp.path().join("chat_log.jsonl"),
        LogRotationPolicy::default(),
    ));
    let script = ScriptedAssistant::new("content rust ownership", &[]);
    let echo = Arc::new(EchoAnswerGenerator {
        assistant_name: "Axis".to_string(),
    });
    let collaborators = Collaborators {
        classifier: Arc::new(PrefixIntentClassifier),
        answers: echo.clone(),
        transcript: transcript.clone(),
        ..scripted_collaborators(&script)
    };
    let (publisher, _observer) = status_channel(AssistantState::Available);
    let mut harness = harness(collaborators, echo, publisher, &content_dir);

    let outcome = harness.orchestration.run_cycle().await.expect("cycle");

    let turn = outcome.turn().expect("turn");
    assert_eq!(turn.automation_outcomes.len(), 1);
    assert!(turn.automation_outcomes[0].succeeded);
    let written = content_dir.join("rustownership.txt");
    let body = std::fs::read_to_string(&written).expect("content file");
    assert!(body.contains("Written offline by Axis."));
    assert_eq!(
        harness.desktop.viewed.lock().expect("lock").as_slice(),
        [written]
    );

    let entries = transcript.recent(10).expect("transcript");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].role, TranscriptRole::User);
    assert_eq!(entries[0].content, "content rust ownership");
}
