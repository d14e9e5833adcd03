//! Hysteresis stability detector.
//!
//! Entry is judged on the change from the previous filtered value; exit is
//! judged against the weight latched when stability was declared.

use crate::config::StabilityCfg;
use crate::token::{EventToken, TokenGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StabilityState {
    pub is_stable: bool,
    /// Latched on entry; reference for the exit test.
    pub stable_weight: f32,
    pub run_length: u32,
    pub previous_filtered: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StabilityEvent {
    /// Stability declared at a positive weight. The first of the session
    /// carries a correlation token.
    StableEntered {
        weight: f32,
        token: Option<EventToken>,
    },
    /// Left the band around the latched weight, at a positive weight.
    StableExited { weight: f32 },
}

impl StabilityEvent {
    pub fn weight(&self) -> f32 {
        match self {
            Self::StableEntered { weight, .. } | Self::StableExited { weight } => *weight,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StabilityDetector {
    delta_g: f32,
    run_length: u32,
    state: StabilityState,
    tokens: TokenGenerator,
    token_issued: bool,
}

impl StabilityDetector {
    pub fn new(cfg: &StabilityCfg) -> Self {
        Self {
            delta_g: cfg.delta_g,
            run_length: cfg.run_length.max(1),
            state: StabilityState::default(),
            tokens: TokenGenerator::new(),
            token_issued: false,
        }
    }

    pub fn state(&self) -> &StabilityState {
        &self.state
    }

    pub fn is_stable(&self) -> bool {
        self.state.is_stable
    }

    /// Whether the session token has already been handed out.
    pub fn token_issued(&self) -> bool {
        self.token_issued
    }

    /// Feed one filtered weight. `tick_ms` seeds the session token.
    pub fn update(&mut self, filtered: f32, tick_ms: u32) -> Option<StabilityEvent> {
        let s = &mut self.state;
        if (filtered - s.previous_filtered).abs() < self.delta_g {
            s.run_length = s.run_length.saturating_add(1);
        } else {
            s.run_length = 0;
        }
        s.previous_filtered = filtered;

        if !s.is_stable && s.run_length >= self.run_length {
            s.is_stable = true;
            s.stable_weight = filtered;
            if filtered <= 0.0 {
                tracing::debug!(weight = filtered, "stable at non-positive weight; not reported");
                return None;
            }
            let token = if self.token_issued {
                None
            } else {
                self.token_issued = true;
                Some(self.tokens.next_token(tick_ms))
            };
            tracing::info!(weight = filtered, first = token.is_some(), "stable");
            return Some(StabilityEvent::StableEntered {
                weight: filtered,
                token,
            });
        }

        if s.is_stable && (filtered - s.stable_weight).abs() > self.delta_g {
            s.is_stable = false;
            tracing::info!(weight = filtered, from = s.stable_weight, "left stable");
            if filtered > 0.0 {
                return Some(StabilityEvent::StableExited { weight: filtered });
            }
        }
        None
    }

    /// Forget run length and stable latch. The session token stays spent.
    pub fn reset(&mut self) {
        self.state = StabilityState::default();
    }
}
