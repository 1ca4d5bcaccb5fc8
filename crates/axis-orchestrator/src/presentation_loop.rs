//! Fixed-interval renderer over a [`StatusObserver`].
//!
//! Every tick renders the clock. The state label is rendered when the state
//! changes and the display text only when it differs from the last text
//! rendered. Reads are snapshot loads and never block the writer.

use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tracing::error;

use crate::shutdown::{ShutdownController, ShutdownSignal};
use crate::status_channel::{AssistantState, StatusObserver};

const CLOCK_FORMAT: &str = "%H:%M:%S";

/// Output surface driven by the presentation loop. Calls must not block.
pub trait DisplaySink: Send {
    fn render_message(&mut self, text: &str) -> Result<()>;

    fn render_state(&mut self, state: AssistantState) -> Result<()>;

    fn render_clock(&mut self, clock: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentationTick {
    pub message_rendered: bool,
    pub state_rendered: bool,
}

pub struct PresentationLoop {
    observer: StatusObserver,
    sink: Box<dyn DisplaySink>,
    interval: Duration,
    last_message: Option<String>,
    last_state: Option<AssistantState>,
}

impl PresentationLoop {
    pub fn new(observer: StatusObserver, sink: Box<dyn DisplaySink>, interval: Duration) -> Self {
        Self {
            observer,
            sink,
            interval,
            last_message: None,
            last_state: None,
        }
    }

    pub fn tick(&mut self) -> Result<PresentationTick> {
        let snapshot = self.observer.snapshot();
        self.sink
            .render_clock(&chrono::Local::now().format(CLOCK_FORMAT).to_string())?;

        let mut tick = PresentationTick::default();
        if self.last_state != Some(snapshot.state) {
            self.sink.render_state(snapshot.state)?;
            self.last_state = Some(snapshot.state);
            tick.state_rendered = true;
        }
        if let Some(text) = snapshot.display_text() {
            if !text.trim().is_empty() && self.last_message.as_deref() != Some(text.as_str()) {
                self.sink.render_message(&text)?;
                self.last_message = Some(text);
                tick.message_rendered = true;
            }
        }
        Ok(tick)
    }

    /// Ticks until `signal` triggers. A sink failure is fatal: shutdown is
    /// triggered through `controller` and the error returned.
    pub async fn run(
        mut self,
        mut signal: ShutdownSignal,
        controller: ShutdownController,
    ) -> Result<()> {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(render_error) = self.tick() {
                        error!(
                            reason_code = "presentation_sink_failed",
                            error = %format!("{render_error:#}"),
                            "presentation loop stopped on sink failure"
                        );
                        controller.trigger("presentation failure");
                        return Err(render_error);
                    }
                }
                _ = signal.triggered() => return Ok(()),
            }
        }
    }
}
