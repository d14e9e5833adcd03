//! Serial event lines.
//!
//! `{"uuid":"<token>","weight":12.34}` for the session's first stable event,
//! `{"weight":12.34}` for every other one.

use std::io::Write;

use crate::error::{NodeError, Result};
use crate::stability::StabilityEvent;

/// Destination for stability events in serial mode.
pub trait EventSink {
    fn emit(&mut self, event: &StabilityEvent) -> Result<()>;
}

impl<E: EventSink + ?Sized> EventSink for Box<E> {
    fn emit(&mut self, event: &StabilityEvent) -> Result<()> {
        (**self).emit(event)
    }
}

pub fn format_event_line(event: &StabilityEvent) -> String {
    match event {
        StabilityEvent::StableEntered {
            weight,
            token: Some(token),
        } => format!("{{\"uuid\":\"{token}\",\"weight\":{weight:.2}}}"),
        StabilityEvent::StableEntered { weight, token: None }
        | StabilityEvent::StableExited { weight } => format!("{{\"weight\":{weight:.2}}}"),
    }
}

/// Writes one line per event and flushes, so a reader on the other end of
/// a pipe or UART sees events as they happen.
pub struct LineSink<W: Write> {
    out: W,
}

impl<W: Write> LineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl LineSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> EventSink for LineSink<W> {
    fn emit(&mut self, event: &StabilityEvent) -> Result<()> {
        let line = format_event_line(event);
        writeln!(self.out, "{line}")
            .and_then(|()| self.out.flush())
            .map_err(|e| eyre::Report::new(NodeError::Io(e.to_string())))
    }
}
