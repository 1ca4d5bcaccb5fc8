use std::io::Write;

use anyhow::{Context, Result};
use axis_orchestrator::{AssistantState, DisplaySink};

/// Line-oriented status display. The clock is not printed on its own; it
/// prefixes the next state or message line.
pub(crate) struct TerminalDisplaySink<W: Write + Send> {
    writer: W,
    clock: String,
}

impl<W: Write + Send> TerminalDisplaySink<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            writer,
            clock: String::new(),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        if self.clock.is_empty() {
            writeln!(self.writer, "{line}")
        } else {
            writeln!(self.writer, "{} {line}", self.clock)
        }
        .context("failed to write status display")?;
        self.writer
            .flush()
            .context("failed to flush status display")
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> DisplaySink for TerminalDisplaySink<W> {
    fn render_message(&mut self, text: &str) -> Result<()> {
        self.write_line(text)
    }

    fn render_state(&mut self, state: AssistantState) -> Result<()> {
        self.write_line(&format!("[{}]", state.label()))
    }

    fn render_clock(&mut self, clock: &str) -> Result<()> {
        if self.clock != clock {
            self.clock = clock.to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use axis_orchestrator::{AssistantState, DisplaySink};

    use super::TerminalDisplaySink;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unit_lines_are_prefixed_with_latest_clock() {
        let mut sink = TerminalDisplaySink::new(Vec::new());
        sink.render_message("Axis : Hello").expect("render");
        sink.render_clock("09:15:00").expect("clock");
        sink.render_state(AssistantState::Thinking).expect("render");

        let output = String::from_utf8(sink.into_inner()).expect("utf8");
        assert_eq!(
            output,
            format!(
                "Axis : Hello\n09:15:00 [{}]\n",
                AssistantState::Thinking.label()
            )
        );
    }

    #[test]
    fn unit_clock_alone_writes_nothing() {
        let mut sink = TerminalDisplaySink::new(Vec::new());
        sink.render_clock("09:15:00").expect("clock");
        sink.render_clock("09:15:01").expect("clock");
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn regression_write_failure_is_reported() {
        let mut sink = TerminalDisplaySink::new(ClosedPipe);
        assert!(sink.render_message("Axis : Hello").is_err());
    }
}
