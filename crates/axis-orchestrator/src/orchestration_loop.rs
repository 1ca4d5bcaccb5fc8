//! The control loop: activation polling, capture, classification, routing,
//! answering, and automation fan-out, with every state transition published
//! through the status channel.

use std::sync::Arc;
use std::time::Duration;

use axis_core::elapsed_unix_ms_since;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::activation::ActivationFlag;
use crate::automation_dispatcher::{AutomationDispatcher, AutomationOutcome};
use crate::collaborators::{Collaborators, OrchestrationError};
use crate::conversation::{modify_answer, modify_query, speech_text, ConversationTurn};
use crate::intent_router::{route_raw_tokens, AnswerIntent, AutomationBatch, RoutePlan};
use crate::shutdown::{join_with_grace, ShutdownController, ShutdownSignal};
use crate::status_channel::{AssistantState, DisplayRecord, StatusObserver, StatusPublisher};

const DEFAULT_IDLE_POLL_MS: u64 = 100;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000;
const FAREWELL_QUERY: &str = "Okay, Bye!";
const FAREWELL_FALLBACK: &str = "Goodbye.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationConfig {
    pub username: String,
    pub assistant_name: String,
    /// Sleep between activation checks while idle.
    pub idle_poll: Duration,
    /// Time outstanding automation batches get once shutdown starts.
    pub shutdown_grace: Duration,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            username: "User".to_string(),
            assistant_name: "Axis".to_string(),
            idle_poll: Duration::from_millis(DEFAULT_IDLE_POLL_MS),
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// How one cycle ended.
pub enum CycleOutcome {
    /// Nothing usable was captured; no turn was started.
    Aborted,
    Completed(ConversationTurn),
    /// A collaborator failed; the turn carries the error text.
    Failed(ConversationTurn),
    /// The turn requested exit; the farewell has been rendered.
    Exit(ConversationTurn),
}

impl CycleOutcome {
    pub fn turn(&self) -> Option<&ConversationTurn> {
        match self {
            Self::Aborted => None,
            Self::Completed(turn) | Self::Failed(turn) | Self::Exit(turn) => Some(turn),
        }
    }
}

pub struct OrchestrationLoop {
    config: OrchestrationConfig,
    collaborators: Collaborators,
    dispatcher: Arc<AutomationDispatcher>,
    publisher: StatusPublisher,
    activation: ActivationFlag,
    shutdown: ShutdownController,
    pending_batches: Vec<JoinHandle<Vec<AutomationOutcome>>>,
    turns_started: usize,
}

impl OrchestrationLoop {
    pub fn new(
        config: OrchestrationConfig,
        collaborators: Collaborators,
        dispatcher: AutomationDispatcher,
        publisher: StatusPublisher,
        activation: ActivationFlag,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            config,
            collaborators,
            dispatcher: Arc::new(dispatcher),
            publisher,
            activation,
            shutdown,
            pending_batches: Vec::new(),
            turns_started: 0,
        }
    }

    pub fn observer(&self) -> StatusObserver {
        self.publisher.observer()
    }

    pub fn pending_batch_count(&self) -> usize {
        self.pending_batches.len()
    }

    /// Publishes startup records (greeting or recent history) as a single
    /// display block.
    pub fn publish_records(&self, records: &[DisplayRecord]) -> Result<(), OrchestrationError> {
        if records.is_empty() {
            return Ok(());
        }
        self.publisher.publish_display(DisplayRecord::block(records))?;
        Ok(())
    }

    /// Runs until shutdown is triggered, by an exit request or externally.
    /// Only status channel I/O failures are returned as errors.
    pub async fn run(mut self, mut signal: ShutdownSignal) -> Result<(), OrchestrationError> {
        let result = self.run_until_shutdown(&mut signal).await;
        if let Err(failure) = &result {
            error!(
                reason_code = failure.reason_code(),
                error = %failure,
                "orchestration loop stopped on fatal error"
            );
            self.shutdown.trigger(format!("status channel failure: {failure}"));
        }
        self.drain().await;
        result
    }

    async fn run_until_shutdown(
        &mut self,
        signal: &mut ShutdownSignal,
    ) -> Result<(), OrchestrationError> {
        let idle_poll = self.config.idle_poll;
        loop {
            if signal.is_triggered() {
                return Ok(());
            }
            self.collect_finished_batches().await;

            if !self.activation.is_armed() {
                self.publisher.publish_if_changed(AssistantState::Available)?;
                tokio::select! {
                    _ = tokio::time::sleep(idle_poll) => {}
                    _ = signal.triggered() => return Ok(()),
                }
                continue;
            }

            let outcome = tokio::select! {
                outcome = self.run_cycle() => outcome?,
                _ = signal.triggered() => return Ok(()),
            };
            match outcome {
                CycleOutcome::Exit(_) => {
                    self.shutdown.trigger("exit requested");
                    return Ok(());
                }
                CycleOutcome::Aborted | CycleOutcome::Failed(_) => {
                    tokio::select! {
                        _ = tokio::time::sleep(idle_poll) => {}
                        _ = signal.triggered() => return Ok(()),
                    }
                }
                CycleOutcome::Completed(_) => {}
            }
        }
    }

    /// Runs one Listening → Thinking → answer → Available cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, OrchestrationError> {
        self.publisher.publish(AssistantState::Listening)?;
        let utterance = match self.collaborators.capture.capture().await {
            Ok(Some(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                debug!(reason_code = "cycle_empty_utterance", "empty capture; cycle aborted");
                self.publisher.publish(AssistantState::Available)?;
                return Ok(CycleOutcome::Aborted);
            }
            Err(capture_error) => {
                let failure = OrchestrationError::CaptureFailure(format!("{capture_error:#}"));
                self.publish_failure(&failure)?;
                return Ok(CycleOutcome::Aborted);
            }
        };

        let turn_index = self.turns_started;
        self.turns_started = self.turns_started.saturating_add(1);
        let mut turn = ConversationTurn::new(utterance.as_str());
        let record = turn.record(&self.config.username, &utterance);
        self.publisher.publish_display(record)?;
        self.publisher.publish(AssistantState::Thinking)?;

        let raw_tokens = match self.collaborators.classifier.classify(&utterance).await {
            Ok(raw_tokens) => raw_tokens,
            Err(classify_error) => {
                let failure =
                    OrchestrationError::ClassificationFailure(format!("{classify_error:#}"));
                return self.fail_cycle(turn, failure).await;
            }
        };
        let plan = route_raw_tokens(&raw_tokens);
        turn.intents = plan.intents();
        info!(
            reason_code = "cycle_routed",
            tokens = raw_tokens.len(),
            intents = turn.intents.len(),
            exit = plan.exit,
            "decision tokens routed"
        );
        if plan.is_empty() {
            self.publisher.publish(AssistantState::Available)?;
            self.append_transcript(&turn).await;
            return Ok(CycleOutcome::Completed(turn));
        }

        self.execute_plan(turn, plan, turn_index).await
    }

    async fn execute_plan(
        &mut self,
        mut turn: ConversationTurn,
        plan: RoutePlan,
        turn_index: usize,
    ) -> Result<CycleOutcome, OrchestrationError> {
        let batch = plan.automation.as_ref().map(|batch| self.spawn_batch(batch));

        if let Some(image) = &plan.image {
            if let Err(image_error) = self.collaborators.images.request_image(&image.prompt).await
            {
                warn!(
                    reason_code = "cycle_image_request_failed",
                    error = %format!("{image_error:#}"),
                    "image generation request failed"
                );
            }
        }

        if let Some(answer) = &plan.answer {
            if let Err(failure) = self.answer(&mut turn, answer, turn_index).await {
                if let Some(batch) = batch {
                    self.pending_batches.push(batch);
                }
                if !plan.exit || failure.is_fatal() {
                    return self.fail_cycle(turn, failure).await;
                }
                // Exit is terminal: report the failure, then still say goodbye.
                let record = self.publish_failure(&failure)?;
                turn.records.push(record);
                turn.error = Some(failure.to_string());
                self.farewell(&mut turn, turn_index).await?;
                self.append_transcript(&turn).await;
                return Ok(CycleOutcome::Exit(turn));
            }
        }

        if plan.exit {
            self.farewell(&mut turn, turn_index).await?;
            if let Some(batch) = batch {
                self.pending_batches.push(batch);
            }
            self.append_transcript(&turn).await;
            return Ok(CycleOutcome::Exit(turn));
        }

        if let Some(batch) = batch {
            if plan.answer.is_none() || batch.is_finished() {
                turn.automation_outcomes = collect_batch(batch).await;
            } else {
                self.pending_batches.push(batch);
            }
        }
        self.publisher.publish(AssistantState::Available)?;
        self.append_transcript(&turn).await;
        Ok(CycleOutcome::Completed(turn))
    }

    fn spawn_batch(&self, batch: &AutomationBatch) -> JoinHandle<Vec<AutomationOutcome>> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let batch = batch.clone();
        tokio::spawn(async move { dispatcher.dispatch(&batch).await })
    }

    async fn answer(
        &self,
        turn: &mut ConversationTurn,
        intent: &AnswerIntent,
        turn_index: usize,
    ) -> Result<(), OrchestrationError> {
        if intent.text().trim().is_empty() {
            debug!(reason_code = "cycle_blank_answer_query", "answer query was blank");
            return Ok(());
        }
        let query = modify_query(intent.text());
        let generated = match intent {
            AnswerIntent::Realtime(_) => {
                self.publisher.publish(AssistantState::Searching)?;
                self.collaborators.answers.answer_realtime(&query).await
            }
            AnswerIntent::General(_) => self.collaborators.answers.answer_general(&query).await,
        };
        let answer = modify_answer(&generated.map_err(|answer_error| {
            OrchestrationError::AnswerGenerationFailure(format!("{answer_error:#}"))
        })?);

        let record = turn.record(&self.config.assistant_name, &answer);
        self.publisher.publish_display(record)?;
        self.publisher.publish(AssistantState::Answering)?;
        turn.answer = Some(answer.clone());
        self.collaborators
            .speech
            .render(&speech_text(&answer, turn_index))
            .await
            .map_err(|speech_error| {
                OrchestrationError::SpeechRenderFailure(format!("{speech_error:#}"))
            })
    }

    async fn farewell(
        &self,
        turn: &mut ConversationTurn,
        turn_index: usize,
    ) -> Result<(), OrchestrationError> {
        let farewell = match self
            .collaborators
            .answers
            .answer_general(&modify_query(FAREWELL_QUERY))
            .await
        {
            Ok(text) if !text.trim().is_empty() => modify_answer(&text),
            Ok(_) => FAREWELL_FALLBACK.to_string(),
            Err(answer_error) => {
                warn!(
                    reason_code = "cycle_farewell_fallback",
                    error = %format!("{answer_error:#}"),
                    "farewell generation failed; using fixed farewell"
                );
                FAREWELL_FALLBACK.to_string()
            }
        };
        let record = turn.record(&self.config.assistant_name, &farewell);
        self.publisher.publish_display(record)?;
        self.publisher.publish(AssistantState::Answering)?;
        if let Err(speech_error) = self
            .collaborators
            .speech
            .render(&speech_text(&farewell, turn_index))
            .await
        {
            warn!(
                reason_code = "cycle_farewell_speech_failed",
                error = %format!("{speech_error:#}"),
                "farewell speech failed"
            );
        }
        turn.answer = Some(farewell);
        Ok(())
    }

    async fn fail_cycle(
        &self,
        mut turn: ConversationTurn,
        failure: OrchestrationError,
    ) -> Result<CycleOutcome, OrchestrationError> {
        if failure.is_fatal() {
            return Err(failure);
        }
        let record = self.publish_failure(&failure)?;
        turn.records.push(record);
        turn.error = Some(failure.to_string());
        self.append_transcript(&turn).await;
        Ok(CycleOutcome::Failed(turn))
    }

    fn publish_failure(
        &self,
        failure: &OrchestrationError,
    ) -> Result<DisplayRecord, OrchestrationError> {
        warn!(
            reason_code = failure.reason_code(),
            error = %failure,
            "orchestration cycle abandoned"
        );
        let record = DisplayRecord::new(&self.config.assistant_name, failure.user_message());
        self.publisher.publish(AssistantState::Error)?;
        self.publisher.publish_display(record.clone())?;
        self.publisher.publish(AssistantState::Available)?;
        Ok(record)
    }

    async fn append_transcript(&self, turn: &ConversationTurn) {
        debug!(
            intents = turn.intents.len(),
            automation_outcomes = turn.automation_outcomes.len(),
            failed = turn.error.is_some(),
            elapsed_ms = elapsed_unix_ms_since(turn.started_unix_ms),
            "conversation turn finished"
        );
        if let Err(transcript_error) = self.collaborators.transcript.append_turn(turn).await {
            warn!(
                reason_code = "transcript_append_failed",
                error = %format!("{transcript_error:#}"),
                "failed to append conversation turn"
            );
        }
    }

    async fn collect_finished_batches(&mut self) {
        if self.pending_batches.is_empty() {
            return;
        }
        let (finished, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_batches)
            .into_iter()
            .partition(JoinHandle::is_finished);
        self.pending_batches = pending;
        for batch in finished {
            collect_batch(batch).await;
        }
    }

    async fn drain(&mut self) {
        let grace = self.config.shutdown_grace;
        let pending = std::mem::take(&mut self.pending_batches);
        if !pending.is_empty() {
            let outstanding = pending.len();
            let aborted = join_with_grace(pending, grace).await;
            info!(
                reason_code = "shutdown_automation_drained",
                outstanding,
                aborted,
                "outstanding automation batches drained"
            );
        }
        self.collaborators.images.shutdown(grace).await;
    }
}

async fn collect_batch(batch: JoinHandle<Vec<AutomationOutcome>>) -> Vec<AutomationOutcome> {
    match batch.await {
        Ok(outcomes) => {
            for outcome in outcomes.iter().filter(|outcome| !outcome.succeeded) {
                warn!(
                    reason_code = "automation_command_failed",
                    command = %outcome.command,
                    used_fallback = outcome.used_fallback,
                    detail = %outcome.detail,
                    "automation command failed"
                );
            }
            outcomes
        }
        Err(join_error) => {
            warn!(
                reason_code = "automation_batch_crashed",
                error = %join_error,
                "automation batch task ended abnormally"
            );
            Vec::new()
        }
    }
}
