//! Per-cycle results returned by the node loop.

use std::time::Duration;

use crate::radio::RadioLinkState;
use crate::stability::StabilityEvent;

/// One conditioned sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub raw: i32,
    /// Calibrated, unfiltered weight in grams.
    pub weight: f32,
    /// Moving-average output in grams.
    pub filtered: f32,
    pub event: Option<StabilityEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Rail code discarded; no state was touched.
    Saturated { raw: i32 },
    Measured(Measurement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Link state after this cycle, in radio mode.
    pub link_state: Option<RadioLinkState>,
    /// How long the loop should wait before the next cycle.
    pub delay: Duration,
    /// A re-tare ran at the start of this cycle.
    pub retared: bool,
}

impl CycleReport {
    pub fn event(&self) -> Option<&StabilityEvent> {
        match &self.outcome {
            CycleOutcome::Measured(m) => m.event.as_ref(),
            CycleOutcome::Saturated { .. } => None,
        }
    }

    pub fn is_saturated(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Saturated { .. })
    }
}
