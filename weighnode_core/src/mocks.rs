//! Test and helper mocks for weighnode_core

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use weighnode_traits::{BoxError, Scale};

use crate::error::Result;
use crate::report::{EventSink, format_event_line};
use crate::stability::StabilityEvent;

/// A scale that replays a fixed list of raw values, then reads the timeout
/// sentinel 0 forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedScale {
    values: VecDeque<i32>,
    reads: usize,
}

impl ScriptedScale {
    pub fn new(values: impl IntoIterator<Item = i32>) -> Self {
        Self {
            values: values.into_iter().collect(),
            reads: 0,
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Scale for ScriptedScale {
    fn read(&mut self, _timeout: std::time::Duration) -> std::result::Result<i32, BoxError> {
        self.reads += 1;
        Ok(self.values.pop_front().unwrap_or(0))
    }
}

/// A scale that always errors on read.
pub struct FailingScale;

impl Scale for FailingScale {
    fn read(&mut self, _timeout: std::time::Duration) -> std::result::Result<i32, BoxError> {
        Err(Box::new(std::io::Error::other("scale bus fault")))
    }
}

/// Event sink that keeps formatted lines in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&mut self, event: &StabilityEvent) -> Result<()> {
        if let Ok(mut g) = self.lines.lock() {
            g.push(format_event_line(event));
        }
        Ok(())
    }
}
